//! Load-time resolution of a demo's channel graph into an executable frame
//! plan: which buffer stage draws when, which channel reads which resource,
//! and which targets need a previous-frame copy.
//!
//! The rules are the ones feedback demos depend on:
//!
//! - a stage referencing itself always reads its own previous frame;
//! - a cross-stage reference is same-frame unless marked `history`, and
//!   same-frame references force the producer to draw first;
//! - a same-frame cycle cannot be scheduled and is rejected here, before any
//!   GPU resource exists.
//!
//! Everything in this module is pure so the ordering and cycle rules stay
//! testable without a device.

use thiserror::Error;

use crate::types::{ChannelBindings, ChannelSource, DemoBundle, CHANNEL_COUNT, MAX_BUFFER_STAGES};

/// What a bound channel resolves to once stage names are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRef {
    /// Texture, video, or noise; materialized by the GPU channel loader.
    Asset,
    /// Buffer stage (by declaration index) drawn earlier this frame.
    SameFrame(usize),
    /// Buffer stage (by declaration index), previous frame's contents.
    History(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("demo declares {0} buffer stages; at most {MAX_BUFFER_STAGES} are supported")]
    TooManyBuffers(usize),

    #[error("stage name '{stage}' declared more than once")]
    DuplicateStage { stage: String },

    #[error("stage '{stage}' references unknown buffer '{name}'")]
    UnknownBuffer { stage: String, name: String },

    #[error(
        "same-frame dependency cycle between stages {stages:?}; \
         mark one of the links `history` to defer it to the previous frame"
    )]
    SameFrameCycle { stages: Vec<String> },
}

/// The per-frame execution plan: buffer draw order, resolved channels, and
/// history requirements. Computed once at load time; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Buffer stage indices in draw order (dependency leaves first). The
    /// image pass always draws after every entry here.
    pub order: Vec<usize>,
    /// Resolved channels per buffer stage, in declaration order.
    pub buffer_channels: Vec<[Option<ChannelRef>; CHANNEL_COUNT]>,
    /// Resolved channels for the image pass.
    pub image_channels: [Option<ChannelRef>; CHANNEL_COUNT],
    /// Per buffer stage: whether any consumer reads its previous frame, in
    /// which case the stage owns a front/back target pair.
    pub history: Vec<bool>,
}

impl StagePlan {
    pub fn resolve(bundle: &DemoBundle) -> Result<Self, PlanError> {
        let buffer_count = bundle.buffers.len();
        if buffer_count > MAX_BUFFER_STAGES {
            return Err(PlanError::TooManyBuffers(buffer_count));
        }

        let mut names: Vec<&str> = Vec::with_capacity(buffer_count + 1);
        for stage in bundle.buffers.iter().chain(std::iter::once(&bundle.image)) {
            if names.contains(&stage.name.as_str()) {
                return Err(PlanError::DuplicateStage {
                    stage: stage.name.clone(),
                });
            }
            names.push(stage.name.as_str());
        }

        let mut buffer_channels = Vec::with_capacity(buffer_count);
        let mut history = vec![false; buffer_count];

        for (index, stage) in bundle.buffers.iter().enumerate() {
            let refs = resolve_stage(bundle, Some(index), &stage.name, &stage.channels)?;
            mark_history(&refs, &mut history);
            buffer_channels.push(refs);
        }
        let image_channels = resolve_stage(bundle, None, &bundle.image.name, &bundle.image.channels)?;
        mark_history(&image_channels, &mut history);

        let order = schedule(bundle, &buffer_channels)?;

        Ok(Self {
            order,
            buffer_channels,
            image_channels,
            history,
        })
    }

    /// Draw calls issued per frame: every buffer stage plus the image pass.
    pub fn draw_calls_per_frame(&self) -> usize {
        self.order.len() + 1
    }

    /// Compiled programs a demo needs: one per buffer stage plus the image.
    pub fn program_count(&self) -> usize {
        self.buffer_channels.len() + 1
    }

    /// Off-screen color targets a demo needs: two for history-backed stages,
    /// one otherwise, none for the image pass.
    pub fn target_count(&self) -> usize {
        self.history.iter().map(|paired| if *paired { 2 } else { 1 }).sum()
    }
}

fn resolve_stage(
    bundle: &DemoBundle,
    consumer: Option<usize>,
    consumer_name: &str,
    channels: &ChannelBindings,
) -> Result<[Option<ChannelRef>; CHANNEL_COUNT], PlanError> {
    let mut refs = [None; CHANNEL_COUNT];
    for (slot_index, slot) in channels.slots().iter().enumerate() {
        let Some(slot) = slot else { continue };
        refs[slot_index] = Some(match &slot.source {
            ChannelSource::Texture { .. }
            | ChannelSource::Video { .. }
            | ChannelSource::Noise { .. } => ChannelRef::Asset,
            ChannelSource::Buffer { stage, history } => {
                let producer = bundle
                    .buffers
                    .iter()
                    .position(|candidate| &candidate.name == stage)
                    .ok_or_else(|| PlanError::UnknownBuffer {
                        stage: consumer_name.to_string(),
                        name: stage.clone(),
                    })?;
                if *history || consumer == Some(producer) {
                    ChannelRef::History(producer)
                } else {
                    ChannelRef::SameFrame(producer)
                }
            }
        });
    }
    Ok(refs)
}

fn mark_history(refs: &[Option<ChannelRef>; CHANNEL_COUNT], history: &mut [bool]) {
    for channel in refs.iter().flatten() {
        if let ChannelRef::History(producer) = channel {
            history[*producer] = true;
        }
    }
}

/// Stable topological sort over same-frame edges: among ready stages the one
/// declared first draws first, so declaration order survives where the graph
/// allows it.
fn schedule(
    bundle: &DemoBundle,
    buffer_channels: &[[Option<ChannelRef>; CHANNEL_COUNT]],
) -> Result<Vec<usize>, PlanError> {
    let count = buffer_channels.len();
    let mut indegree = vec![0usize; count];
    for (consumer, refs) in buffer_channels.iter().enumerate() {
        for channel in refs.iter().flatten() {
            if let ChannelRef::SameFrame(producer) = channel {
                if *producer != consumer {
                    indegree[consumer] += 1;
                }
            }
        }
    }

    let mut order = Vec::with_capacity(count);
    let mut placed = vec![false; count];
    while order.len() < count {
        let Some(next) = (0..count).find(|&idx| !placed[idx] && indegree[idx] == 0) else {
            let stages = (0..count)
                .filter(|&idx| !placed[idx])
                .map(|idx| bundle.buffers[idx].name.clone())
                .collect();
            return Err(PlanError::SameFrameCycle { stages });
        };
        placed[next] = true;
        order.push(next);
        for (consumer, refs) in buffer_channels.iter().enumerate() {
            if placed[consumer] {
                continue;
            }
            for channel in refs.iter().flatten() {
                if *channel == ChannelRef::SameFrame(next) {
                    indegree[consumer] -= 1;
                }
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelSlot, StageDesc};

    fn stage(name: &str, channels: ChannelBindings) -> StageDesc {
        StageDesc {
            name: name.into(),
            source: "void mainImage(out vec4 c, vec2 f) { c = vec4(0.0); }".into(),
            channels,
        }
    }

    fn buffer_slot(name: &str, history: bool) -> ChannelSlot {
        ChannelSlot::new(ChannelSource::Buffer {
            stage: name.into(),
            history,
        })
    }

    fn bindings(slots: Vec<(usize, ChannelSlot)>) -> ChannelBindings {
        let mut out = ChannelBindings::new();
        for (channel, slot) in slots {
            out.set(channel, slot).unwrap();
        }
        out
    }

    fn bundle(buffers: Vec<StageDesc>, image: StageDesc) -> DemoBundle {
        DemoBundle {
            key: "test".into(),
            name: "Test".into(),
            common: None,
            buffers,
            image,
        }
    }

    #[test]
    fn image_only_demo_plans_one_draw_and_no_targets() {
        let image = stage(
            "image",
            bindings(vec![(
                0,
                ChannelSlot::new(ChannelSource::Texture {
                    path: "tex0.png".into(),
                }),
            )]),
        );
        let plan = StagePlan::resolve(&bundle(vec![], image)).unwrap();
        assert!(plan.order.is_empty());
        assert_eq!(plan.draw_calls_per_frame(), 1);
        assert_eq!(plan.program_count(), 1);
        assert_eq!(plan.target_count(), 0);
        assert_eq!(plan.image_channels[0], Some(ChannelRef::Asset));
    }

    #[test]
    fn chained_buffers_draw_in_dependency_order() {
        let a = stage("a", ChannelBindings::new());
        let b = stage("b", bindings(vec![(0, buffer_slot("a", false))]));
        let image = stage("image", bindings(vec![(0, buffer_slot("b", false))]));
        let plan = StagePlan::resolve(&bundle(vec![a, b], image)).unwrap();
        assert_eq!(plan.order, vec![0, 1]);
        assert_eq!(plan.history, vec![false, false]);
        assert_eq!(plan.program_count(), 3);
        assert_eq!(plan.target_count(), 2);
    }

    #[test]
    fn declaration_order_yields_to_dependencies() {
        // "late" is declared first but consumes "early" same-frame.
        let late = stage("late", bindings(vec![(0, buffer_slot("early", false))]));
        let early = stage("early", ChannelBindings::new());
        let image = stage("image", bindings(vec![(0, buffer_slot("late", false))]));
        let plan = StagePlan::resolve(&bundle(vec![late, early], image)).unwrap();
        assert_eq!(plan.order, vec![1, 0]);
    }

    #[test]
    fn self_reference_is_always_history() {
        // history is declared false; self-feedback still reads last frame.
        let state = stage("state", bindings(vec![(0, buffer_slot("state", false))]));
        let image = stage("image", bindings(vec![(0, buffer_slot("state", false))]));
        let plan = StagePlan::resolve(&bundle(vec![state], image)).unwrap();
        assert_eq!(plan.buffer_channels[0][0], Some(ChannelRef::History(0)));
        assert_eq!(plan.history, vec![true]);
        assert_eq!(plan.target_count(), 2);
        assert_eq!(plan.order, vec![0]);
    }

    #[test]
    fn same_frame_cycle_is_rejected() {
        let a = stage("a", bindings(vec![(0, buffer_slot("b", false))]));
        let b = stage("b", bindings(vec![(0, buffer_slot("a", false))]));
        let image = stage("image", bindings(vec![(0, buffer_slot("a", false))]));
        let err = StagePlan::resolve(&bundle(vec![a, b], image)).unwrap_err();
        match err {
            PlanError::SameFrameCycle { stages } => {
                assert!(stages.contains(&"a".to_string()));
                assert!(stages.contains(&"b".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn history_edge_breaks_the_cycle() {
        let a = stage("a", bindings(vec![(0, buffer_slot("b", true))]));
        let b = stage("b", bindings(vec![(0, buffer_slot("a", false))]));
        let image = stage("image", bindings(vec![(0, buffer_slot("b", false))]));
        let plan = StagePlan::resolve(&bundle(vec![a, b], image)).unwrap();
        assert_eq!(plan.order, vec![0, 1]);
        // `b` is read at history age by `a`, so it keeps a pair; `a` is only
        // read same-frame.
        assert_eq!(plan.history, vec![false, true]);
        assert_eq!(plan.target_count(), 3);
    }

    #[test]
    fn unknown_buffer_is_rejected() {
        let image = stage("image", bindings(vec![(0, buffer_slot("ghost", false))]));
        let err = StagePlan::resolve(&bundle(vec![], image)).unwrap_err();
        assert_eq!(
            err,
            PlanError::UnknownBuffer {
                stage: "image".into(),
                name: "ghost".into()
            }
        );
    }

    #[test]
    fn duplicate_stage_name_is_rejected() {
        let a1 = stage("a", ChannelBindings::new());
        let a2 = stage("a", ChannelBindings::new());
        let image = stage("image", ChannelBindings::new());
        let err = StagePlan::resolve(&bundle(vec![a1, a2], image)).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateStage { .. }));
    }

    #[test]
    fn too_many_buffers_is_rejected() {
        let buffers = (0..5)
            .map(|i| stage(&format!("b{i}"), ChannelBindings::new()))
            .collect();
        let image = stage("image", ChannelBindings::new());
        let err = StagePlan::resolve(&bundle(buffers, image)).unwrap_err();
        assert_eq!(err, PlanError::TooManyBuffers(5));
    }
}
