//! On-demand generation and load cache.
//!
//! Callers submit rendered source text under a name; a [`Backend`] turns the
//! accumulated unit set into produced code, and the scope-keyed [`Registry`]
//! guarantees at most one installed implementation per (scope, name) pair no
//! matter how many threads race to produce it. A failed compile evicts only
//! the unit that caused it; everything installed earlier stays usable.

pub mod registry;

pub use registry::{Registry, Scope};

use smol_str::SmolStr;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

// ─── Source units and diagnostics ───────────────────────────────────────────

/// One named piece of source text submitted for generation.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub name: SmolStr,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One report from the backend compiler, tied to the unit it came from.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub unit: SmolStr,
    pub message: String,
}

impl Diagnostic {
    pub fn error(unit: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            unit: unit.into(),
            message: message.into(),
        }
    }

    pub fn warning(unit: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            unit: unit.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag} [{}]: {}", self.unit, self.message)
    }
}

/// One artifact produced by a compile. A single source unit may yield more
/// than one produced name (helper shapes, nested definitions).
#[derive(Debug, Clone)]
pub struct ProducedUnit {
    pub name: SmolStr,
    pub code: Vec<u8>,
}

/// Everything a backend compile run returned.
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub produced: Vec<ProducedUnit>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

// ─── Backend ────────────────────────────────────────────────────────────────

/// The platform seam: compiles the full accumulated unit set and links
/// produced code into invocable artifacts.
///
/// `compile` always receives every unit the cache has accepted so far, so a
/// newly submitted unit may reference definitions from earlier, successfully
/// compiled units of the same cache instance.
pub trait Backend {
    type Artifact: Send + Sync + 'static;

    fn compile(&self, units: &[SourceUnit]) -> CompileReport;

    /// Turn one produced unit's code into an invocable artifact. A failure
    /// here means the generation pipeline itself is broken; it surfaces as
    /// [`CacheError::LoadInconsistency`] and is never retried.
    fn link(&self, name: &str, code: &[u8]) -> Result<Self::Artifact, String>;
}

// ─── Errors ─────────────────────────────────────────────────────────────────

/// One or more error-severity diagnostics from the backend. Recoverable:
/// resubmitting corrected source under the same name starts clean.
#[derive(Debug, Clone, Error)]
pub struct CompilationError {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        write!(f, "compilation failed with {errors} error(s)")?;
        for d in &self.diagnostics {
            write!(f, "\n  {d}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    /// The compile reported success but the requested implementation could
    /// not be resolved or linked. A defect in the pipeline, not in the
    /// caller's input; must propagate, never be silently retried.
    #[error("implementation `{name}` unresolvable after successful compile: {detail}")]
    LoadInconsistency { name: SmolStr, detail: String },
}

// ─── ImplCache ──────────────────────────────────────────────────────────────

/// Generation-and-load cache over one backend and one shared registry.
///
/// The unit set sits behind its own lock, held across the backend compile:
/// one compile at a time per cache instance. The registry lock is never held
/// while compiling, so lookups for unrelated (scope, name) pairs are never
/// blocked by a slow compile. No cancellation exists for an in-flight
/// compile; a caller that needs one must wrap the call externally.
pub struct ImplCache<B: Backend> {
    backend: B,
    units: Mutex<Vec<SourceUnit>>,
    registry: Arc<Registry<B::Artifact>>,
}

impl<B: Backend> ImplCache<B> {
    pub fn new(backend: B, registry: Arc<Registry<B::Artifact>>) -> Self {
        Self {
            backend,
            units: Mutex::new(Vec::new()),
            registry,
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<Registry<B::Artifact>> {
        &self.registry
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Names of the units currently accumulated, in submission order.
    pub fn unit_names(&self) -> Vec<SmolStr> {
        self.units
            .lock()
            .expect("unit set lock poisoned")
            .iter()
            .map(|u| u.name.clone())
            .collect()
    }

    /// Add (or replace) a unit and compile the full accumulated set.
    ///
    /// On success, returns every artifact the compile produced. On any
    /// error-severity diagnostic, the just-added unit is removed (so a
    /// corrected resubmission starts clean) and earlier, independently
    /// successful units are left untouched.
    pub fn generate(&self, name: &str, text: &str) -> Result<Vec<ProducedUnit>, CompilationError> {
        let mut units = self.units.lock().expect("unit set lock poisoned");
        match units.iter_mut().find(|u| u.name == name) {
            Some(unit) => unit.text = text.to_string(),
            None => units.push(SourceUnit {
                name: SmolStr::from(name),
                text: text.to_string(),
            }),
        }

        let report = self.backend.compile(&units);
        if report.has_errors() {
            units.retain(|u| u.name != name);
            return Err(CompilationError {
                diagnostics: report.diagnostics,
            });
        }
        Ok(report.produced)
    }

    /// Return the installed implementation for (scope, name), generating and
    /// installing it first if needed.
    ///
    /// Once this succeeds for a pair, every later call for the same pair
    /// returns the identical `Arc`, from any thread: concurrent callers that
    /// also compiled merge at the registry and the losers' artifacts are
    /// discarded.
    pub fn install_and_load(
        &self,
        scope: &Scope,
        name: &str,
        text: &str,
    ) -> Result<Arc<B::Artifact>, CacheError> {
        if let Some(installed) = self.registry.get(scope, name) {
            return Ok(installed);
        }
        self.registry.ensure_scope(scope);

        // Compile without any registry lock held.
        let produced = self.generate(name, text)?;

        for unit in &produced {
            if self.registry.contains(scope, &unit.name) {
                continue;
            }
            let artifact =
                self.backend
                    .link(&unit.name, &unit.code)
                    .map_err(|detail| CacheError::LoadInconsistency {
                        name: unit.name.clone(),
                        detail,
                    })?;
            self.registry
                .insert_if_absent(scope, &unit.name, Arc::new(artifact));
        }

        self.registry
            .get(scope, name)
            .ok_or_else(|| CacheError::LoadInconsistency {
                name: SmolStr::from(name),
                detail: "compile succeeded but did not produce the requested name".to_string(),
            })
    }
}
