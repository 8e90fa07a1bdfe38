use memtest_cli::sequence::{generator_words, hex_word, parse_hex_word};
use memtest_cli::session::{run_session, SessionConfig, SessionReport, DEFAULT_STEP_BUDGET};
use memtest_core::{
    BitFlip, CsrBus, CsrWriteResult, Engine, EngineConfig, LfsrConfig, ReadBeat, ReadState,
    StepInputs, StepOutputs, Throttle, DEFAULT_ADDRESS_WIDTH,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format!($($t)*)))
}

/// Engine parameters as passed from JS. Missing fields take the defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WasmConfig {
    pub data_width: Option<u8>,
    pub state_width: Option<u8>,
    pub taps: Option<Vec<u8>>,
    pub seed_hex: Option<String>,
    pub address_width: Option<u8>,
}

impl WasmConfig {
    fn to_engine_config(&self) -> Result<EngineConfig, String> {
        let mut lfsr = LfsrConfig::default();
        if let Some(bits) = self.data_width {
            lfsr.output_bits = bits;
        }
        if let Some(bits) = self.state_width {
            lfsr.state_bits = bits;
        }
        if let Some(taps) = &self.taps {
            lfsr.taps.clone_from(taps);
        }
        if let Some(seed) = &self.seed_hex {
            lfsr.seed = parse_hex_word(seed)?;
        }
        let config = EngineConfig {
            lfsr,
            address_width: self.address_width.unwrap_or(DEFAULT_ADDRESS_WIDTH),
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

/// JS-compatible view of one step's outputs. Words travel as hex strings.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmStepOutputs {
    pub write_strobe: bool,
    pub write_data_hex: String,
    pub write_accepted: bool,
    pub read_ready: bool,
    pub read_state: String,
    pub mismatch: bool,
}

impl WasmStepOutputs {
    fn from_outputs(outputs: &StepOutputs, bits: u8) -> Self {
        Self {
            write_strobe: outputs.write.strobe,
            write_data_hex: hex_word(outputs.write.data, bits),
            write_accepted: outputs.write_accepted,
            read_ready: outputs.read_ready,
            read_state: match outputs.read_state {
                ReadState::Idle => "idle",
                ReadState::Compare => "compare",
            }
            .to_string(),
            mismatch: outputs.mismatch,
        }
    }
}

/// Session parameters as passed from JS. Throttles and flips use the core
/// types' own field names (`{ period, stalled }`, `{ address, bit }`).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WasmSessionOptions {
    pub words: Option<u64>,
    pub base: usize,
    pub write_stall: Option<Throttle>,
    pub read_gap: Option<Throttle>,
    pub flips: Vec<BitFlip>,
    pub step_budget: Option<u64>,
}

impl WasmSessionOptions {
    fn to_session_config(&self, engine: EngineConfig) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            engine,
            words: self.words.unwrap_or(defaults.words),
            base: self.base,
            write_throttle: self.write_stall.unwrap_or(Throttle::NONE),
            read_throttle: self.read_gap.unwrap_or(Throttle::NONE),
            flips: self.flips.clone(),
            step_budget: self.step_budget.unwrap_or(DEFAULT_STEP_BUDGET),
        }
    }
}

/// JS-compatible version of SessionReport
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmSessionReport {
    pub magic: u16,
    pub words_written: u64,
    pub words_compared: u64,
    pub errors: u64,
    pub write_steps: u64,
    pub read_steps: u64,
    pub passed: bool,
}

impl From<SessionReport> for WasmSessionReport {
    fn from(report: SessionReport) -> Self {
        Self {
            magic: report.magic,
            words_written: report.words_written,
            words_compared: report.words_compared,
            errors: report.errors,
            write_steps: report.write_steps,
            read_steps: report.read_steps,
            passed: report.passed(),
        }
    }
}

#[wasm_bindgen]
pub struct WasmMemtest {
    engine: Engine,
}

#[wasm_bindgen]
impl WasmMemtest {
    /// Builds an engine from a config object; `undefined` takes the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Self, JsError> {
        console_error_panic_hook::set_once();
        let config: WasmConfig = if config.is_undefined() || config.is_null() {
            WasmConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let engine_config = config.to_engine_config().map_err(|e| JsError::new(&e))?;
        let engine = Engine::new(engine_config)?;
        console_log!(
            "memtest engine ready: {}-bit words, {}-bit counters",
            engine.config().lfsr.output_bits,
            engine.config().address_width
        );
        Ok(Self { engine })
    }

    /// Host register write. Returns false when the register is read-only.
    pub fn write_csr(&mut self, offset: u16, value: u64) -> Result<bool, JsError> {
        let result = self.engine.write_csr(offset, value)?;
        Ok(result == CsrWriteResult::Applied)
    }

    /// Host register read.
    pub fn read_csr(&mut self, offset: u16) -> Result<u64, JsError> {
        Ok(self.engine.read_csr(offset)?)
    }

    /// Advances one step with the given fabric signals.
    pub fn step(
        &mut self,
        write_ready: bool,
        read_valid: bool,
        read_data_hex: &str,
    ) -> Result<JsValue, JsError> {
        let data = if read_valid {
            parse_hex_word(read_data_hex).map_err(|e| JsError::new(&e))?
        } else {
            0
        };
        let outputs = self.engine.step(StepInputs {
            write_ready,
            read: ReadBeat {
                valid: read_valid,
                data,
            },
        });
        let view = WasmStepOutputs::from_outputs(&outputs, self.engine.config().lfsr.output_bits);
        Ok(serde_wasm_bindgen::to_value(&view)?)
    }

    /// Steps committed so far.
    pub fn cycle(&self) -> u64 {
        self.engine.cycle()
    }

    /// Runs a full write/read-back session with this engine's parameters
    /// against a fresh simulated memory.
    pub fn run_session(&self, options: JsValue) -> Result<JsValue, JsError> {
        let options: WasmSessionOptions = if options.is_undefined() || options.is_null() {
            WasmSessionOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        let config = options.to_session_config(self.engine.config().clone());
        let report = WasmSessionReport::from(run_session(config)?);
        console_log!(
            "memtest session: {} words, {} errors",
            report.words_compared,
            report.errors
        );
        Ok(serde_wasm_bindgen::to_value(&report)?)
    }

    /// First `count` generator words as zero-padded hex strings.
    pub fn lfsr_words(&self, count: usize) -> Result<js_sys::Array, JsError> {
        let lfsr = &self.engine.config().lfsr;
        let words = generator_words(lfsr, count)?;
        Ok(words
            .into_iter()
            .map(|word| JsValue::from_str(&hex_word(word, lfsr.output_bits)))
            .collect())
    }
}
