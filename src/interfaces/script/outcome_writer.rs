use crate::domain::operation::{OperationOutput, Outcome};
use crate::error::{PaymentError, ScriptError};
use serde::Serialize;
use std::io::Write;

/// One reported operation outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeRecord {
    /// Failed before anything was started.
    Rejected {
        step: usize,
        operation: String,
        code: &'static str,
        message: String,
    },
    Resolved {
        step: usize,
        operation: String,
        result: OperationOutput,
    },
    Failed {
        step: usize,
        operation: String,
        code: &'static str,
        message: String,
    },
    /// Still outstanding when the script ended.
    Pending { step: usize, operation: String },
}

impl OutcomeRecord {
    pub fn rejected(step: usize, operation: impl Into<String>, err: &PaymentError) -> Self {
        Self::Rejected {
            step,
            operation: operation.into(),
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn settled(step: usize, operation: impl Into<String>, outcome: Outcome) -> Self {
        match outcome {
            Ok(result) => Self::Resolved {
                step,
                operation: operation.into(),
                result,
            },
            Err(err) => Self::Failed {
                step,
                operation: operation.into(),
                code: err.code(),
                message: err.to_string(),
            },
        }
    }
}

/// Writes outcome records as JSON lines.
pub struct OutcomeWriter<W: Write> {
    writer: W,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, record: &OutcomeRecord) -> Result<(), ScriptError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn write_all<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a OutcomeRecord>,
    ) -> Result<(), ScriptError> {
        for record in records {
            self.write(record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
