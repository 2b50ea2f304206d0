use std::borrow::Cow;

use anyhow::Result;
use wgpu::naga::ShaderStage;

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    }))
}

/// Wraps a stage body with the ShaderToy prelude and compiles it as GLSL.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    common: Option<&str>,
) -> Result<wgpu::ShaderModule> {
    let wrapped = wrap_fragment(source, common);
    tracing::trace!(stage = label, bytes = wrapped.len(), "compiling wrapped fragment");

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    }))
}

/// Produces a self-contained GLSL fragment shader from raw ShaderToy code.
///
/// Steps performed:
///
/// 1. Strip `#version` directives and ShaderToy uniform declarations so we can
///    inject our own definitions.
/// 2. Prepend [`HEADER`] which declares the uniform block, sampler bindings,
///    and macro aliases, followed by the demo's shared prelude when present.
/// 3. Append [`FOOTER`] which remaps `gl_FragCoord`, calls `mainImage`, and
///    writes to `outColor`.
pub(crate) fn wrap_fragment(source: &str, common: Option<&str>) -> String {
    let mut sanitized = String::new();
    let mut skipped_version = false;
    for line in source.lines() {
        if !skipped_version && line.trim_start().starts_with("#version") {
            skipped_version = true;
            continue;
        }
        if is_shadertoy_uniform_decl(line) {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }

    let mut wrapped = String::with_capacity(HEADER.len() + sanitized.len() + FOOTER.len() + 64);
    wrapped.push_str(HEADER);
    if let Some(common) = common {
        wrapped.push('\n');
        for line in common.lines() {
            if line.trim_start().starts_with("#version") || is_shadertoy_uniform_decl(line) {
                continue;
            }
            wrapped.push_str(line);
            wrapped.push('\n');
        }
    }
    wrapped.push_str("\n#line 1\n");
    wrapped.push_str(&sanitized);
    wrapped.push_str(FOOTER);
    wrapped
}

fn is_shadertoy_uniform_decl(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("uniform ")
        && (trimmed.contains("iResolution")
            || trimmed.contains("iTimeDelta")
            || trimmed.contains("iTime")
            || trimmed.contains("iFrame")
            || trimmed.contains("iMouse")
            || trimmed.contains("iDate")
            || trimmed.contains("iSampleRate")
            || trimmed.contains("iChannelTime")
            || trimmed.contains("iChannelResolution")
            || trimmed.contains("iChannel0")
            || trimmed.contains("iChannel1")
            || trimmed.contains("iChannel2")
            || trimmed.contains("iChannel3"))
}

/// GLSL prologue injected ahead of every stage body.
///
/// The uniform block layout must match the renderer's `StageUniforms` struct
/// field-for-field. `_resolution` is a vec4 whose `w` mirrors `_time`, so the
/// block has no implicit padding anywhere and the std140 offsets line up with
/// the Rust struct exactly.
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform DeckParams {
    vec4 _resolution;
    float _time;
    float _timeDelta;
    int _frame;
    float _sampleRate;
    vec4 _mouse;
    vec4 _date;
    float _channelTime[4];
    vec3 _channelResolution[4];
} deck;

// Map ShaderToy names to our UBO fields via macros to avoid name clashes.
#define iResolution deck._resolution.xyz
#define iTime deck._time
#define iTimeDelta deck._timeDelta
#define iFrame deck._frame
#define iMouse deck._mouse
#define iDate deck._date
#define iSampleRate deck._sampleRate
#define iChannelTime deck._channelTime
#define iChannelResolution deck._channelResolution

layout(set = 1, binding = 0) uniform texture2D deck_channel0_texture;
layout(set = 1, binding = 1) uniform sampler deck_channel0_sampler;
layout(set = 1, binding = 2) uniform texture2D deck_channel1_texture;
layout(set = 1, binding = 3) uniform sampler deck_channel1_sampler;
layout(set = 1, binding = 4) uniform texture2D deck_channel2_texture;
layout(set = 1, binding = 5) uniform sampler deck_channel2_sampler;
layout(set = 1, binding = 6) uniform texture2D deck_channel3_texture;
layout(set = 1, binding = 7) uniform sampler deck_channel3_sampler;

#define iChannel0 sampler2D(deck_channel0_texture, deck_channel0_sampler)
#define iChannel1 sampler2D(deck_channel1_texture, deck_channel1_sampler)
#define iChannel2 sampler2D(deck_channel2_texture, deck_channel2_sampler)
#define iChannel3 sampler2D(deck_channel3_texture, deck_channel3_sampler)

vec4 deck_gl_FragCoord;
#define gl_FragCoord deck_gl_FragCoord
";

/// GLSL epilogue that remaps coordinates and delegates to `mainImage`.
const FOOTER: &str = r"void main() {
    // Capture the real builtin gl_FragCoord, then remap to ShaderToy's
    // bottom-left origin. Temporarily undef the macro to read the builtin.
    #undef gl_FragCoord
    vec2 builtinFC = vec2(gl_FragCoord.x, gl_FragCoord.y);
    #define gl_FragCoord deck_gl_FragCoord

    vec2 fragCoord = vec2(builtinFC.x, iResolution.y - builtinFC.y);
    deck_gl_FragCoord = vec4(fragCoord, 0.0, 1.0);

    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    outColor = color;
}
";

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";
