//! Boundary facade: text to wire bytes and back.

use textplan_core::Plan;
use textplan_wire::{DEFAULT_MAX_DEPTH, Decoder, Encoder};

use crate::analyze::resolve_names;
use crate::build::build_with_max_depth;
use crate::emit::{EmitOptions, TextFormat, emit};
use crate::parser::parse_with_fuel;
use crate::{Diagnostics, Error, Result};

const DEFAULT_EXEC_FUEL: u32 = 1_000_000;
/// Text nests at most twice as deep as the plan it spells, so any plan
/// within the depth limit parses back.
const DEFAULT_RECURSION_FUEL: u32 = 2 * DEFAULT_MAX_DEPTH;

const LENGTH_PREFIX: usize = size_of::<usize>();

/// Owned wire bytes of one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanBytes(Vec<u8>);

impl PlanBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Boundary envelope: native-endian `usize` payload length, then the
    /// payload.
    pub fn to_length_prefixed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LENGTH_PREFIX + self.0.len());
        out.extend_from_slice(&self.0.len().to_ne_bytes());
        out.extend_from_slice(&self.0);
        out
    }

    pub fn from_length_prefixed(envelope: &[u8]) -> Result<Self> {
        if envelope.is_empty() {
            return Err(Error::EmptyInput);
        }
        let Some((prefix, payload)) = envelope.split_first_chunk::<LENGTH_PREFIX>() else {
            return Err(Error::Envelope {
                declared: LENGTH_PREFIX,
                actual: envelope.len(),
            });
        };
        let declared = usize::from_ne_bytes(*prefix);
        if declared != payload.len() {
            return Err(Error::Envelope {
                declared,
                actual: payload.len(),
            });
        }
        Ok(Self(payload.to_vec()))
    }
}

impl AsRef<[u8]> for PlanBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PlanBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Configured transcoder. Stateless between calls.
#[derive(Debug, Clone)]
pub struct Transcoder {
    exec_fuel: Option<u32>,
    recursion_fuel: Option<u32>,
    max_depth: u32,
    format: TextFormat,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            exec_fuel: Some(DEFAULT_EXEC_FUEL),
            recursion_fuel: Some(DEFAULT_RECURSION_FUEL),
            max_depth: DEFAULT_MAX_DEPTH,
            format: TextFormat::Standard,
        }
    }
}

impl Transcoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser token budget; `None` removes the limit.
    pub fn with_exec_fuel(mut self, fuel: Option<u32>) -> Self {
        self.exec_fuel = fuel;
        self
    }

    /// Parser nesting budget; `None` removes the limit.
    pub fn with_recursion_fuel(mut self, fuel: Option<u32>) -> Self {
        self.recursion_fuel = fuel;
        self
    }

    /// Plan nesting limit, shared by the builder, the wire codec, the
    /// emitter and JSON loading.
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    /// Text to plan. The first stage that reports errors stops the pipeline.
    pub fn compile(&self, text: &str) -> Result<Plan> {
        let (parsed, diagnostics) = parse_with_fuel(text, self.exec_fuel, self.recursion_fuel)?;
        if diagnostics.has_errors() {
            return Err(Error::Parse(diagnostics));
        }

        let mut diagnostics = Diagnostics::new();
        let table = resolve_names(&parsed.root(), &mut diagnostics);
        if diagnostics.has_errors() {
            return Err(Error::Resolve(diagnostics));
        }

        Ok(build_with_max_depth(&table, self.max_depth)?)
    }

    /// Every diagnostic for `text`, without producing output.
    ///
    /// Build errors join the diagnostics when they have a source position;
    /// the rest are returned as [`Error::Build`].
    pub fn check(&self, text: &str) -> Result<Diagnostics> {
        let (parsed, mut diagnostics) =
            parse_with_fuel(text, self.exec_fuel, self.recursion_fuel)?;
        if diagnostics.has_errors() {
            return Ok(diagnostics);
        }

        let table = resolve_names(&parsed.root(), &mut diagnostics);
        if diagnostics.has_errors() {
            return Ok(diagnostics);
        }

        if let Err(err) = build_with_max_depth(&table, self.max_depth) {
            if err.range.is_none() {
                return Err(err.into());
            }
            diagnostics.extend(err.to_diagnostics());
        }
        Ok(diagnostics)
    }

    pub fn load_from_text(&self, text: &str) -> Result<PlanBytes> {
        let plan = self.compile(text)?;
        let bytes = self.encoder().encode(&plan)?;
        tracing::debug!(
            relations = plan.relation_count(),
            bytes = bytes.len(),
            "text loaded"
        );
        Ok(PlanBytes(bytes))
    }

    pub fn save_to_text(&self, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::EmptyInput);
        }
        let plan = self.decoder().decode(bytes)?;
        self.emit(&plan)
    }

    /// JSON plan to wire bytes. The plan passes the same checks as one
    /// read from bytes.
    pub fn load_from_json(&self, json: &str) -> Result<PlanBytes> {
        if json.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        let plan: Plan = serde_json::from_str(json).map_err(|e| Error::Json(e.to_string()))?;
        let bytes = self.encoder().encode(&plan)?;
        self.decoder().decode(&bytes)?;
        tracing::debug!(
            relations = plan.relation_count(),
            bytes = bytes.len(),
            "json loaded"
        );
        Ok(PlanBytes(bytes))
    }

    /// Wire bytes to a pretty-printed JSON plan.
    ///
    /// serde_json refuses to read documents nested past its own recursion
    /// limit, so the output is read back once and refused if it would not
    /// load.
    pub fn save_to_json(&self, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::EmptyInput);
        }
        let plan = self.decoder().decode(bytes)?;
        let json = serde_json::to_string_pretty(&plan).map_err(|e| Error::Json(e.to_string()))?;
        serde_json::from_str::<Plan>(&json).map_err(|e| Error::Json(e.to_string()))?;
        Ok(json)
    }

    fn encoder(&self) -> Encoder {
        Encoder::new().with_max_depth(self.max_depth)
    }

    fn decoder(&self) -> Decoder {
        Decoder::new().with_max_depth(self.max_depth)
    }

    /// Plan to text in the configured format.
    pub fn emit(&self, plan: &Plan) -> Result<String> {
        Ok(emit(
            plan,
            EmitOptions {
                format: self.format,
                max_depth: self.max_depth,
            },
        )?)
    }
}

/// [`Transcoder::load_from_text`] with default limits.
pub fn load_from_text(text: &str) -> Result<PlanBytes> {
    Transcoder::default().load_from_text(text)
}

/// [`Transcoder::save_to_text`] with default limits.
pub fn save_to_text(bytes: &[u8]) -> Result<String> {
    Transcoder::default().save_to_text(bytes)
}

/// [`Transcoder::load_from_json`] with default limits.
pub fn load_from_json(json: &str) -> Result<PlanBytes> {
    Transcoder::default().load_from_json(json)
}

/// [`Transcoder::save_to_json`] with default limits.
pub fn save_to_json(bytes: &[u8]) -> Result<String> {
    Transcoder::default().save_to_json(bytes)
}
