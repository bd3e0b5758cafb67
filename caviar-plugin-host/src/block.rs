//! Blocks and their lifecycle
//!
//! A block is a buildable unit. It declares hooks plugins can tap, the
//! phases it takes part in, and two lifecycle methods the host calls in
//! order: `create` with the resolved options, then `run`.
//!
//! ```text
//!   Defined ──create──► Created ──run──► Ran
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use caviar_plugin_api::{OptionSchema, Phases};
use serde_json::Value;
use thiserror::Error;

use crate::hooks::{HookError, HookTable};

/// Errors raised by a block or while driving its lifecycle
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Block '{block}' does not implement `{method}`")]
    NotImplemented {
        block: String,
        method: &'static str,
    },

    #[error("Block '{block}' has invalid phases {phases}: expected a list of phase names")]
    InvalidPhases { block: String, phases: String },

    #[error("Block '{block}' failed: {source}")]
    RunFailed {
        block: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Hook(#[from] HookError),
}

impl BlockError {
    pub fn not_implemented(block: impl Into<String>, method: &'static str) -> Self {
        Self::NotImplemented {
            block: block.into(),
            method,
        }
    }

    pub fn run_failed(block: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::RunFailed {
            block: block.into(),
            source: source.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::InvalidPhases { .. } => "INVALID_PHASES",
            Self::RunFailed { .. } => "BLOCK_RUN_FAILED",
            Self::Hook(e) => e.code(),
        }
    }
}

/// What a block sees while running
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    block: &'a str,
    created: Option<&'a Value>,
}

impl<'a> RunContext<'a> {
    /// State returned by `create`, if it ran
    pub fn created(&self) -> Option<&'a Value> {
        self.created
    }

    /// State returned by `create`.
    ///
    /// # Panics
    ///
    /// Panics if `create` has not run: calling `run` first is a host bug.
    pub fn expect_created(&self) -> &'a Value {
        match self.created {
            Some(created) => created,
            None => panic!("block '{}': run called before create", self.block),
        }
    }
}

/// A buildable unit with hooks and a create/run lifecycle
#[async_trait]
pub trait Block: Send + Sync {
    fn name(&self) -> &str;

    /// Option schema consumed by config merging
    fn config(&self) -> OptionSchema {
        OptionSchema::new()
    }

    fn hooks(&self) -> &HookTable;

    /// Phases this block takes part in; checked when the host inspects them
    fn phases(&self) -> Phases;

    fn create(&self, options: &Value) -> Result<Value, BlockError> {
        let _ = options;
        Err(BlockError::not_implemented(self.name(), "create"))
    }

    async fn run(&self, ctx: RunContext<'_>, input: Value) -> Result<Value, BlockError> {
        let _ = (ctx, input);
        Err(BlockError::not_implemented(self.name(), "run"))
    }
}

/// Creates a fresh block instance
pub type BlockFactory = Arc<dyn Fn() -> Box<dyn Block> + Send + Sync>;

/// Lifecycle state of a block instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Defined,
    Created,
    Ran,
}

/// A block instance driven by the host
pub struct BlockHandle {
    block: Box<dyn Block>,
    created: Option<Value>,
    state: BlockState,
}

impl BlockHandle {
    pub fn new(block: Box<dyn Block>) -> Self {
        Self {
            block,
            created: None,
            state: BlockState::Defined,
        }
    }

    pub fn name(&self) -> &str {
        self.block.name()
    }

    pub fn hooks(&self) -> &HookTable {
        self.block.hooks()
    }

    pub fn config(&self) -> OptionSchema {
        self.block.config()
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn created(&self) -> Option<&Value> {
        self.created.as_ref()
    }

    /// Declared phases, rejecting anything but a list of names
    pub fn phases(&self) -> Result<Vec<String>, BlockError> {
        match self.block.phases() {
            Phases::List(list) => Ok(list),
            Phases::Malformed(value) => Err(BlockError::InvalidPhases {
                block: self.name().to_string(),
                phases: value.to_string(),
            }),
        }
    }

    pub fn participates_in(&self, phase: &str) -> Result<bool, BlockError> {
        Ok(self.phases()?.iter().any(|p| p == phase))
    }

    pub fn create(&mut self, options: &Value) -> Result<&Value, BlockError> {
        let created = self.block.create(options)?;
        tracing::debug!(block = %self.block.name(), "Block created");
        self.state = BlockState::Created;
        Ok(self.created.insert(created))
    }

    /// Run the block.
    ///
    /// The block receives whatever `create` produced; asserting that it
    /// exists is up to the block.
    pub async fn run(&mut self, input: Value) -> Result<Value, BlockError> {
        if self.state != BlockState::Created {
            tracing::warn!(
                block = %self.block.name(),
                state = ?self.state,
                "Block run outside the Created state"
            );
        }

        let ctx = RunContext {
            block: self.block.name(),
            created: self.created.as_ref(),
        };
        let result = self.block.run(ctx, input).await?;
        tracing::debug!(block = %self.block.name(), "Block ran");
        self.state = BlockState::Ran;
        Ok(result)
    }
}

impl fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHandle")
            .field("name", &self.name())
            .field("state", &self.state)
            .field("hooks", self.hooks())
            .finish()
    }
}
