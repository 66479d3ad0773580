//! The driver of the derivation pipeline.

use crate::{
    find_l2_heads, DriverConfig, DriverError, DriverResult, EngineController, EngineErrorClass,
    EngineErrorKind, ExecutionPayload, Finalizer, L2ChainHeads, UnsafePayloadError,
    UnsafePayloadQueue,
};
use core::{fmt::Debug, future::Future};
use mako_derive::{
    errors::{PipelineError, PipelineErrorKind, ResetError},
    params::DEPOSIT_TX_TYPE,
    traits::{ChainProvider, Pipeline},
    types::{
        ActivationSignal, AttributesWithParent, BlockInfo, L2BlockInfo, ResetSignal, RollupConfig,
        Signal, StepResult,
    },
};
use std::{sync::Arc, time::Duration};

/// What a single [Driver::step] did, and when the driver should step next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStep {
    /// Derived attributes were executed into a new safe head.
    Derived(L2BlockInfo),
    /// The pipeline made progress; step again right away.
    Progressed,
    /// The pipeline ran out of L1 data; wait for the L1 chain to advance.
    Idle,
    /// A temporary failure; retry after a backoff.
    Backoff,
    /// The pipeline was reset onto the given heads.
    Reset(L2ChainHeads),
}

/// The rollup driver: steps the pipeline on top of the engine's safe head and routes the results.
#[derive(Debug)]
pub struct Driver<P, E, L1>
where
    P: Pipeline + Send + Debug,
    E: EngineController + Send + Debug,
    L1: ChainProvider + Send + Debug,
{
    rollup_config: Arc<RollupConfig>,
    config: DriverConfig,
    pipeline: P,
    engine: E,
    l1: L1,
    heads: L2ChainHeads,
    finalizer: Finalizer,
    unsafe_payloads: UnsafePayloadQueue,
    /// Derived attributes the engine failed to execute for now.
    pending: Option<AttributesWithParent>,
    /// Consecutive temporary failures.
    failures: u32,
    needs_reset: bool,
}

impl<P, E, L1> Driver<P, E, L1>
where
    P: Pipeline + Send + Debug,
    E: EngineController + Send + Debug,
    L1: ChainProvider + Send + Debug,
{
    /// Creates a new [Driver] starting from `heads`.
    ///
    /// The first step runs the reset protocol, so the pipeline does not need to be reset by the
    /// caller.
    pub fn new(
        rollup_config: Arc<RollupConfig>,
        config: DriverConfig,
        pipeline: P,
        engine: E,
        l1: L1,
        heads: L2ChainHeads,
    ) -> Self {
        Self {
            rollup_config,
            unsafe_payloads: UnsafePayloadQueue::new(config.max_unsafe_payloads_bytes),
            config,
            pipeline,
            engine,
            l1,
            heads,
            finalizer: Finalizer::new(),
            pending: None,
            failures: 0,
            needs_reset: true,
        }
    }

    /// Returns the heads of the L2 chain.
    pub const fn heads(&self) -> &L2ChainHeads {
        &self.heads
    }

    /// Returns the current L2 safe head.
    pub const fn l2_safe_head(&self) -> &L2BlockInfo {
        &self.heads.safe
    }

    /// Returns the pipeline.
    pub const fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Returns the engine.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the finalizer.
    pub const fn finalizer(&self) -> &Finalizer {
        &self.finalizer
    }

    /// Queues a payload received ahead of derivation.
    pub fn add_unsafe_payload(
        &mut self,
        payload: ExecutionPayload,
    ) -> Result<(), UnsafePayloadError> {
        self.unsafe_payloads.push(payload)
    }

    /// Receives a finalized L1 block.
    ///
    /// The signal is forwarded to the pipeline, and the highest L2 block derived from finalized
    /// L1 data becomes the finalized head.
    pub async fn on_l1_finalized(&mut self, l1_finalized: BlockInfo) -> DriverResult<(), E::Error> {
        self.pipeline.signal(Signal::L1Finalized(l1_finalized)).await?;

        let finalized_l2 = self.heads.finalized.block_info.number;
        let Some(data) = self.finalizer.on_l1_finalized(l1_finalized, finalized_l2) else {
            return Ok(());
        };
        let canonical = self
            .l1
            .block_info_by_number(data.l1_block.number)
            .await
            .map_err(|e| DriverError::L1(e.to_string()))?;
        if canonical.hash != data.l1_block.hash {
            warn!(
                target: "driver",
                "L1 block #{} the finalized data was derived from was reorged out",
                data.l1_block.number
            );
            self.needs_reset = true;
            return Ok(());
        }

        info!(target: "driver", "Finalized L2 block #{}", data.l2_block.block_info.number);
        self.heads.finalized = data.l2_block;
        self.engine.forkchoice_updated(self.heads.forkchoice()).await.map_err(DriverError::Engine)
    }

    /// Steps the driver once.
    ///
    /// Critical pipeline errors, engine failures during a reset, and a rejected deposit-only block
    /// are returned as errors; everything else is folded into the [DriverStep].
    pub async fn step(&mut self) -> DriverResult<DriverStep, E::Error> {
        if self.needs_reset {
            let heads = self.reset().await?;
            return Ok(DriverStep::Reset(heads));
        }

        self.try_next_unsafe_payload().await;

        if let Some(attributes) = self.pending.take() {
            debug!(target: "driver", "Retrying pending attributes on L2 block #{}", attributes.parent.block_info.number);
            return self.execute(attributes).await;
        }

        let result = match tokio::time::timeout(
            self.config.step_timeout,
            self.pipeline.step(self.heads.safe),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(target: "driver", "Pipeline step timed out after {:?}", self.config.step_timeout);
                return Ok(self.backoff());
            }
        };

        match result {
            StepResult::PreparedAttributes | StepResult::AttributesInFlight => {
                self.failures = 0;
                let Some(attributes) = self.pipeline.confirm_received() else {
                    return Ok(DriverStep::Progressed);
                };
                self.execute(attributes).await
            }
            StepResult::AdvancedOrigin => {
                self.failures = 0;
                Ok(DriverStep::Progressed)
            }
            StepResult::OriginAdvanceErr(e) | StepResult::StepFailed(e) => self.route(e).await,
        }
    }

    /// Steps until the safe head reaches `target`, or the pipeline runs out of L1 data.
    ///
    /// Returns the safe head derivation stopped at.
    pub async fn advance_to_target(&mut self, target: u64) -> DriverResult<L2BlockInfo, E::Error> {
        loop {
            if self.heads.safe.block_info.number >= target {
                info!(target: "driver", "Derivation complete, reached L2 safe head #{}", self.heads.safe.block_info.number);
                return Ok(self.heads.safe);
            }

            match self.step().await? {
                DriverStep::Idle => {
                    warn!(
                        target: "driver",
                        "Exhausted data source; halting derivation at L2 safe head #{}",
                        self.heads.safe.block_info.number
                    );
                    return Ok(self.heads.safe);
                }
                DriverStep::Backoff => tokio::time::sleep(self.config.backoff(self.failures)).await,
                _ => {}
            }
        }
    }

    /// Runs the driver until `shutdown` resolves or a critical error occurs.
    ///
    /// The shutdown future is polled between steps; a step in progress is never interrupted.
    pub async fn run<F>(&mut self, shutdown: F) -> DriverResult<(), E::Error>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        loop {
            let delay = match self.step().await {
                Ok(DriverStep::Idle) => Some(self.config.idle_interval),
                Ok(DriverStep::Backoff) => Some(self.config.backoff(self.failures)),
                Ok(_) => None,
                Err(e) => {
                    error!(target: "driver", "Driver stopped: {e}");
                    return Err(e);
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(target: "driver", "Shutting down the driver");
                    return Ok(());
                }
                _ = Self::pause(delay) => {}
            }
        }
    }

    async fn pause(delay: Option<Duration>) {
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
    }

    fn backoff(&mut self) -> DriverStep {
        self.failures = self.failures.saturating_add(1);
        DriverStep::Backoff
    }

    /// Routes a failed step by its error class.
    async fn route(&mut self, err: PipelineErrorKind) -> DriverResult<DriverStep, E::Error> {
        match err {
            PipelineErrorKind::Temporary(PipelineError::NotEnoughData) => {
                trace!(target: "driver", "Not enough data, stepping again");
                Ok(DriverStep::Progressed)
            }
            PipelineErrorKind::Temporary(PipelineError::Eof) => {
                self.failures = 0;
                debug!(target: "driver", "Pipeline is out of L1 data");
                Ok(DriverStep::Idle)
            }
            PipelineErrorKind::Temporary(e) => {
                debug!(target: "driver", "Temporary pipeline failure: {e}");
                Ok(self.backoff())
            }
            PipelineErrorKind::Reset(ResetError::HoloceneActivation) => {
                let l1_origin = self.pipeline.origin().ok_or(PipelineError::MissingOrigin.crit())?;
                info!(target: "driver", "Activating Holocene at L1 origin #{}", l1_origin.number);
                self.pipeline
                    .signal(
                        ActivationSignal {
                            l2_safe_head: self.heads.safe,
                            l1_origin,
                            system_config: None,
                        }
                        .signal(),
                    )
                    .await?;
                Ok(DriverStep::Progressed)
            }
            PipelineErrorKind::Reset(e) => {
                warn!(target: "driver", "Pipeline requested a reset: {e}");
                let heads = self.reset().await?;
                Ok(DriverStep::Reset(heads))
            }
            PipelineErrorKind::Critical(e) => {
                error!(target: "driver", "Critical pipeline error: {e}");
                Err(DriverError::Pipeline(PipelineErrorKind::Critical(e)))
            }
        }
    }

    /// Runs the reset protocol: finds the L2 heads to restart from and resets the pipeline onto
    /// an L1 origin a channel timeout behind the safe head's origin.
    async fn reset(&mut self) -> DriverResult<L2ChainHeads, E::Error> {
        let heads = find_l2_heads(&self.rollup_config, &mut self.l1, &mut self.engine).await?;
        let safe = heads.safe;

        let safe_origin = self
            .l1
            .block_info_by_number(safe.l1_origin.number)
            .await
            .map_err(|e| DriverError::L1(e.to_string()))?;
        if safe.block_info.timestamp < safe_origin.timestamp {
            return Err(DriverError::SafeHeadBeforeOrigin {
                l2_time: safe.block_info.timestamp,
                l1_time: safe_origin.timestamp,
            });
        }

        let channel_timeout = self.rollup_config.channel_timeout(safe.block_info.timestamp);
        let start = safe
            .l1_origin
            .number
            .saturating_sub(channel_timeout)
            .max(self.rollup_config.genesis.l1.number);
        let l1_origin = self
            .l1
            .block_info_by_number(start)
            .await
            .map_err(|e| DriverError::L1(e.to_string()))?;

        self.pipeline
            .signal(ResetSignal { l2_safe_head: safe, l1_origin, system_config: None }.signal())
            .await?;
        self.engine.forkchoice_updated(heads.forkchoice()).await.map_err(DriverError::Engine)?;

        info!(
            target: "driver",
            "Reset pipeline to L1 origin #{} with L2 safe head #{}, unsafe head #{}",
            l1_origin.number,
            safe.block_info.number,
            heads.unsafe_.block_info.number
        );
        self.heads = heads;
        self.finalizer.reset();
        self.pending = None;
        self.failures = 0;
        self.needs_reset = false;
        Ok(heads)
    }

    /// Executes derived attributes into a new safe head.
    ///
    /// A rejected payload is retried as a deposit-only block, flushing the channel it came from
    /// after Holocene. A temporary engine failure keeps the attributes pending for the next step,
    /// and a missing pre-state resets the driver.
    async fn execute(
        &mut self,
        mut attributes: AttributesWithParent,
    ) -> DriverResult<DriverStep, E::Error> {
        let block = loop {
            let err = match self.engine.execute_attributes(&attributes).await {
                Ok(block) => break block,
                Err(e) => e,
            };

            match err.kind() {
                EngineErrorKind::Temporary => {
                    warn!(target: "driver", "Temporary engine failure, keeping attributes pending: {err}");
                    self.pending = Some(attributes);
                    return Ok(self.backoff());
                }
                EngineErrorKind::Reset => {
                    warn!(target: "driver", "Engine is missing the pre-state of the attributes: {err}");
                    let heads = self.reset().await?;
                    return Ok(DriverStep::Reset(heads));
                }
                EngineErrorKind::InvalidPayload if is_deposit_only(&attributes) => {
                    error!(target: "driver", "Critical: failed to execute deposit-only block: {err}");
                    return Err(DriverError::Engine(err));
                }
                EngineErrorKind::InvalidPayload => {
                    warn!(target: "driver", "Invalid payload, retrying as a deposit-only block: {err}");
                    if self.rollup_config.is_holocene_active(attributes.attributes.timestamp) {
                        self.pipeline.signal(Signal::FlushChannel).await?;
                    }
                    attributes
                        .attributes
                        .transactions
                        .retain(|tx| tx.first() == Some(&DEPOSIT_TX_TYPE));
                }
            }
        };

        self.heads.advance_safe(block);
        if let Some(origin) = self.pipeline.origin() {
            self.finalizer.on_derived(block, origin.id());
        }
        self.engine.forkchoice_updated(self.heads.forkchoice()).await.map_err(DriverError::Engine)?;
        debug!(target: "driver", "Derived L2 safe head #{}", block.block_info.number);
        Ok(DriverStep::Derived(block))
    }

    /// Inserts the next queued unsafe payload if it extends the unsafe head.
    async fn try_next_unsafe_payload(&mut self) {
        while let Some(next) = self.unsafe_payloads.peek() {
            let head = self.heads.unsafe_.block_info;
            if next.block_number <= head.number {
                trace!(target: "driver", "Dropping unsafe payload #{} at or below the unsafe head", next.block_number);
                self.unsafe_payloads.pop();
                continue;
            }
            if next.block_number != head.number + 1 || next.parent_hash != head.hash {
                trace!(target: "driver", "Unsafe payload #{} does not extend the unsafe head yet", next.block_number);
                return;
            }

            let Some(payload) = self.unsafe_payloads.pop() else { return };
            match self.engine.insert_unsafe_payload(&payload).await {
                Ok(block) => {
                    debug!(target: "driver", "Inserted unsafe payload #{}", block.block_info.number);
                    self.heads.unsafe_ = block;
                }
                Err(e) => warn!(target: "driver", "Dropping invalid unsafe payload #{}: {e}", payload.block_number),
            }
            return;
        }
    }
}

/// Returns true if every transaction of the attributes is a deposit.
fn is_deposit_only(attributes: &AttributesWithParent) -> bool {
    attributes.attributes.transactions.iter().all(|tx| tx.first() == Some(&DEPOSIT_TX_TYPE))
}
