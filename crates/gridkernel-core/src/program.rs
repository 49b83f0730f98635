//! Device program sources, build options and front-end reflection.
//!
//! Programs are written in WGSL. Compile-time constants (`define`) are the
//! equivalent of `-D` build options: they are rendered as `const` declarations
//! ahead of the program text so kernels can use them in attributes such as
//! `@workgroup_size(WG_X, WG_Y)`.

use std::fmt;
use std::path::Path;

use crate::device::WorkShape;
use crate::error::{GridKernelError, Result};

/// A compile-time constant value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// `u32` literal.
    U32(u32),
    /// `i32` literal.
    I32(i32),
    /// `f32` literal.
    F32(f32),
}

impl ConstValue {
    fn wgsl_type(&self) -> &'static str {
        match self {
            ConstValue::U32(_) => "u32",
            ConstValue::I32(_) => "i32",
            ConstValue::F32(_) => "f32",
        }
    }
}

impl fmt::Display for ConstValue {
    /// Render as a typed WGSL literal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::U32(v) => write!(f, "{}u", v),
            ConstValue::I32(v) => write!(f, "{}i", v),
            ConstValue::F32(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}f", v),
            ConstValue::F32(v) => write!(f, "{}f", v),
        }
    }
}

/// Program text plus build options.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    name: String,
    text: String,
    defines: Vec<(String, ConstValue)>,
}

impl ProgramSource {
    /// Create a program from an in-memory string.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            defines: Vec::new(),
        }
    }

    /// Load a program from a file. The file name becomes the program name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!("Loaded program '{}' ({} bytes)", name, text.len());
        Ok(Self::new(name, text))
    }

    /// Add (or replace) a compile-time constant.
    pub fn define(mut self, name: impl Into<String>, value: ConstValue) -> Self {
        let name = name.into();
        match self.defines.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.defines.push((name, value)),
        }
        self
    }

    /// Define `WG_X`, `WG_Y` and `WG_SIZE` from a work-group shape.
    pub fn with_workgroup(self, local: WorkShape) -> Self {
        self.define("WG_X", ConstValue::U32(local.x))
            .define("WG_Y", ConstValue::U32(local.y))
            .define("WG_SIZE", ConstValue::U32(local.x * local.y))
    }

    /// Program name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unmodified program text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Compile-time constants in declaration order.
    pub fn defines(&self) -> &[(String, ConstValue)] {
        &self.defines
    }

    /// Build options as a single human-readable string (`WG_X=16u WG_Y=1u`).
    pub fn build_options(&self) -> String {
        self.defines
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Full source handed to the compiler: constants first, then the text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + self.defines.len() * 32);
        for (name, value) in &self.defines {
            out.push_str(&format!(
                "const {}: {} = {};\n",
                name,
                value.wgsl_type(),
                value
            ));
        }
        out.push_str(&self.text);
        out
    }
}

/// Outcome of a program build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// Build succeeded.
    Success,
    /// Build failed.
    Error,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "BUILD_SUCCESS"),
            BuildStatus::Error => write!(f, "BUILD_ERROR"),
        }
    }
}

/// Build diagnostics for a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLog {
    /// Program name.
    pub program: String,
    /// Build status.
    pub status: BuildStatus,
    /// Build options string.
    pub options: String,
    /// Complete compiler output.
    pub log: String,
}

impl BuildLog {
    /// A failed build of `source` with compiler output `log`.
    pub fn failed(source: &ProgramSource, log: impl Into<String>) -> Self {
        Self {
            program: source.name().to_string(),
            status: BuildStatus::Error,
            options: source.build_options(),
            log: log.into(),
        }
    }
}

impl fmt::Display for BuildLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Build Status: {}", self.status)?;
        writeln!(f, "Build Options:\t{}", self.options)?;
        write!(f, "Build Log:\t {}", self.log)
    }
}

/// A compute entry point discovered in a compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointInfo {
    /// Entry point name.
    pub name: String,
    /// Declared `@workgroup_size`.
    pub workgroup_size: [u32; 3],
}

impl EntryPointInfo {
    /// The declared work-group size as a 2-D local shape.
    ///
    /// Entry points with a non-trivial third dimension have no 2-D shape.
    pub fn local_shape(&self) -> Option<WorkShape> {
        match self.workgroup_size {
            [x, y, 1] => Some(WorkShape::new(x, y)),
            _ => None,
        }
    }
}

/// Result of running the WGSL front end on a program.
#[derive(Debug)]
pub struct ReflectedProgram {
    /// Rendered source (constants + text) that was validated.
    pub source: String,
    /// Compute entry points in declaration order.
    pub entry_points: Vec<EntryPointInfo>,
}

/// Parse and validate a program, collecting its compute entry points.
///
/// Parse and validation diagnostics are returned as a failed [`BuildLog`].
/// A module without any compute entry point is also a build failure.
pub fn compile_front_end(source: &ProgramSource) -> Result<ReflectedProgram> {
    let rendered = source.render();

    let module = naga::front::wgsl::parse_str(&rendered)
        .map_err(|e| BuildLog::failed(source, e.emit_to_string(&rendered)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| BuildLog::failed(source, e.emit_to_string(&rendered)))?;

    let entry_points: Vec<EntryPointInfo> = module
        .entry_points
        .iter()
        .filter(|ep| ep.stage == naga::ShaderStage::Compute)
        .map(|ep| EntryPointInfo {
            name: ep.name.clone(),
            workgroup_size: ep.workgroup_size,
        })
        .collect();

    if entry_points.is_empty() {
        return Err(GridKernelError::from(BuildLog::failed(
            source,
            "program declares no @compute entry points",
        )));
    }

    tracing::debug!(
        "Front end accepted '{}' with {} entry point(s)",
        source.name(),
        entry_points.len()
    );

    Ok(ReflectedProgram {
        source: rendered,
        entry_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: &str = r#"
@group(0) @binding(1) var<storage, read_write> data: array<f32>;

@compute @workgroup_size(WG_X, WG_Y)
fn scale(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = data[id.x] * 2.0;
}
"#;

    #[test]
    fn test_render_prepends_constants() {
        let source = ProgramSource::new("scale.wgsl", SCALE)
            .define("WG_X", ConstValue::U32(8))
            .define("OMEGA", ConstValue::F32(1.0))
            .define("OFFSET", ConstValue::I32(-3));
        let rendered = source.render();

        assert!(rendered.starts_with("const WG_X: u32 = 8u;\n"));
        assert!(rendered.contains("const OMEGA: f32 = 1.0f;\n"));
        assert!(rendered.contains("const OFFSET: i32 = -3i;\n"));
        assert_eq!(source.build_options(), "WG_X=8u OMEGA=1.0f OFFSET=-3i");
    }

    #[test]
    fn test_define_replaces_existing() {
        let source = ProgramSource::new("p", "")
            .define("WG_X", ConstValue::U32(8))
            .define("WG_X", ConstValue::U32(16));
        assert_eq!(source.defines().len(), 1);
        assert_eq!(source.build_options(), "WG_X=16u");
    }

    #[test]
    fn test_front_end_reflects_workgroup_size() {
        let source =
            ProgramSource::new("scale.wgsl", SCALE).with_workgroup(WorkShape::new(16, 4));
        let reflected = compile_front_end(&source).unwrap();

        assert_eq!(reflected.entry_points.len(), 1);
        let ep = &reflected.entry_points[0];
        assert_eq!(ep.name, "scale");
        assert_eq!(ep.workgroup_size, [16, 4, 1]);
        assert_eq!(ep.local_shape(), Some(WorkShape::new(16, 4)));
    }

    #[test]
    fn test_front_end_reports_syntax_error() {
        let source = ProgramSource::new("broken.wgsl", "fn main( {")
            .define("WG_X", ConstValue::U32(1));
        let err = compile_front_end(&source).unwrap_err();
        let log = err.build_log().unwrap();

        assert_eq!(log.status, BuildStatus::Error);
        assert_eq!(log.program, "broken.wgsl");
        assert_eq!(log.options, "WG_X=1u");
        assert!(!log.log.is_empty());
    }

    #[test]
    fn test_front_end_requires_compute_entry() {
        let source = ProgramSource::new("empty.wgsl", "fn helper() -> f32 { return 1.0; }");
        let err = compile_front_end(&source).unwrap_err();
        assert!(err.build_log().unwrap().log.contains("@compute"));
    }

    #[test]
    fn test_build_log_dump() {
        let log = BuildLog {
            program: "k.wgsl".into(),
            status: BuildStatus::Error,
            options: "WG_X=4u".into(),
            log: "unexpected token".into(),
        };
        let dump = log.to_string();
        assert!(dump.contains("Build Status: BUILD_ERROR"));
        assert!(dump.contains("Build Options:\tWG_X=4u"));
        assert!(dump.contains("Build Log:\t unexpected token"));
    }
}
