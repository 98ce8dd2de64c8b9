// ============================================================
// Layer 5 — Two-Phase Training Controller
// ============================================================
// Drives the model through a fixed state machine:
//
//   Built ──setup_transfer_learning──► TransferLearning
//                                          │ fit()
//                                          ▼
//                     ┌──setup_fine_tuning── (fitted)
//                     ▼                    │
//                FineTuning                │ finish()
//                     │ fit()              ▼
//                     └──── finish() ──►  Done
//
// Phase 1 (transfer learning): the whole backbone is frozen and
// only the new head learns, with Adam at lr 5e-5.
// Phase 2 (fine-tuning): every layer with index >= 172 (the top
// two Inception stages and a slice of mixed_6d) is unfrozen and
// training continues with SGD + momentum 0.9 at lr 5e-5.
//
// Both phases run the same schedule: `epochs` epochs of
// `steps_per_epoch` gradient updates, each followed by
// ceil(validation_steps) validation batches.
//
// The optimiser of the last fitted phase is kept as an
// OptimizerState so it can be saved with the model. A state
// handed back in with with_optimizer_state() is loaded into the
// optimiser of the phase it came from when that phase starts.
//
// Key Burn insight:
//   - Training uses the Autodiff backend for gradients
//   - model.valid() returns the model on the inner backend
//   - Validation batches must also live on the inner backend
//   - argmax(1) returns [batch, 1] so we flatten before .equal()
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{
        adaptor::OptimizerAdaptor, momentum::MomentumConfig, Adam, AdamConfig, GradientsParams,
        Optimizer, Sgd, SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::data::batcher::ImageBatch;
use crate::domain::{
    history::{EpochMetrics, TrainingHistory, TrainingPhase},
    schedule::EpochSchedule,
    traits::HistorySink,
};
use crate::ml::{
    freeze::FreezePolicy,
    model::FineTuneModel,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct PhaseConfig {
    #[config(default = "5e-5")]
    pub transfer_learning_rate: f64,

    #[config(default = "5e-5")]
    pub fine_tune_learning_rate: f64,

    #[config(default = "0.9")]
    pub fine_tune_momentum: f64,

    /// First layer index unfrozen for fine-tuning
    #[config(default = "172")]
    pub freeze_threshold: usize,
}

// ─── PhaseTracker ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Built,
    TransferLearning,
    FineTuning,
    Done,
}

/// The legal-transition rules, kept apart from the model so they are
/// cheap to reason about and to test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTracker {
    state:  ControllerState,
    fitted: bool,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self { state: ControllerState::Built, fitted: false }
    }

    pub fn enter_transfer_learning(&mut self) -> Result<()> {
        if self.state != ControllerState::Built {
            anyhow::bail!("Transfer learning can only start from a freshly built model (state: {:?})", self.state);
        }
        self.state  = ControllerState::TransferLearning;
        self.fitted = false;
        Ok(())
    }

    pub fn enter_fine_tuning(&mut self) -> Result<()> {
        if self.state != ControllerState::TransferLearning || !self.fitted {
            anyhow::bail!(
                "Fine-tuning requires a completed transfer-learning fit (state: {:?}, fitted: {})",
                self.state,
                self.fitted
            );
        }
        self.state  = ControllerState::FineTuning;
        self.fitted = false;
        Ok(())
    }

    /// The phase a fit() call would run.
    pub fn begin_fit(&self) -> Result<TrainingPhase> {
        let phase = match self.state {
            ControllerState::TransferLearning => TrainingPhase::TransferLearning,
            ControllerState::FineTuning       => TrainingPhase::FineTuning,
            state => anyhow::bail!("Cannot fit in state {state:?}"),
        };
        if self.fitted {
            anyhow::bail!("The {phase} phase has already been fitted");
        }
        Ok(phase)
    }

    pub fn mark_fitted(&mut self) {
        self.fitted = true;
    }

    pub fn finish(&mut self) -> Result<()> {
        let active = matches!(self.state, ControllerState::TransferLearning | ControllerState::FineTuning);
        if !active || !self.fitted {
            anyhow::bail!("Nothing to finish (state: {:?}, fitted: {})", self.state, self.fitted);
        }
        self.state = ControllerState::Done;
        Ok(())
    }
}

// ─── Epoch accumulators ───────────────────────────────────────────────────────
/// Sample-weighted running loss and accuracy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    loss_sum: f64,
    correct:  usize,
    seen:     usize,
}

impl RunningStats {
    pub fn add(&mut self, batch_loss: f64, correct: usize, batch_size: usize) {
        self.loss_sum += batch_loss * batch_size as f64;
        self.correct  += correct;
        self.seen     += batch_size;
    }

    pub fn loss(&self) -> f64 {
        if self.seen > 0 { self.loss_sum / self.seen as f64 } else { f64::NAN }
    }

    pub fn accuracy(&self) -> f64 {
        if self.seen > 0 { self.correct as f64 / self.seen as f64 } else { 0.0 }
    }
}

/// Number of rows whose argmax equals the target.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns shape [batch, 1], flatten to [batch]
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted.equal(targets).int().sum().into_scalar().elem::<i64>() as usize
}

fn next_batch<B, I>(stream: &mut I, which: &str) -> Result<ImageBatch<B>>
where
    B: Backend,
    I: Iterator<Item = Result<ImageBatch<B>>>,
{
    match stream.next() {
        Some(batch) => batch.with_context(|| format!("Failed to produce a {which} batch")),
        None => anyhow::bail!("The {which} pipeline is exhausted: it has no images to draw batches from"),
    }
}

// ─── Optimiser state ──────────────────────────────────────────────────────────
pub type AdamOptimizer<B> = OptimizerAdaptor<Adam, FineTuneModel<B>, B>;
pub type SgdOptimizer<B> = OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, FineTuneModel<B>, B>;

pub type AdamRecord<B> = <AdamOptimizer<B> as Optimizer<FineTuneModel<B>, B>>::Record;
pub type SgdRecord<B>  = <SgdOptimizer<B> as Optimizer<FineTuneModel<B>, B>>::Record;

/// Moment estimates of the optimiser that ran a phase.
pub enum OptimizerState<B: AutodiffBackend> {
    /// Transfer learning
    Adam(AdamRecord<B>),
    /// Fine-tuning
    Sgd(SgdRecord<B>),
}

impl<B: AutodiffBackend> OptimizerState<B> {
    pub fn phase(&self) -> TrainingPhase {
        match self {
            OptimizerState::Adam(_) => TrainingPhase::TransferLearning,
            OptimizerState::Sgd(_)  => TrainingPhase::FineTuning,
        }
    }
}

fn progress_bar(steps: usize, phase: TrainingPhase, epoch: usize, epochs: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(steps as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "  [{prefix}] {elapsed_precise} [{bar:40.cyan/blue}] {pos}/{len} • eta {eta} • {msg}",
        )?
        .progress_chars("#>-"),
    );
    pb.set_prefix(format!("{phase} {epoch}/{epochs}"));
    Ok(pb)
}

// ─── TrainingController ───────────────────────────────────────────────────────
pub struct TrainingController<B: AutodiffBackend> {
    model:         Box<FineTuneModel<B>>,
    device:        B::Device,
    schedule:      EpochSchedule,
    config:        PhaseConfig,
    class_weights: Option<Vec<f32>>,
    tracker:       PhaseTracker,
    sink:          Option<Box<dyn HistorySink>>,

    /// Restored state waiting for its phase to start
    resume:    Option<OptimizerState<B>>,
    /// State of the last fitted phase
    optimizer: Option<OptimizerState<B>>,
}

impl<B: AutodiffBackend> TrainingController<B> {
    pub fn new(model: Box<FineTuneModel<B>>, device: B::Device, schedule: EpochSchedule, config: PhaseConfig) -> Self {
        Self {
            model,
            device,
            schedule,
            config,
            class_weights: None,
            tracker: PhaseTracker::new(),
            sink: None,
            resume: None,
            optimizer: None,
        }
    }

    /// Per-class weights for the training loss; validation stays unweighted.
    pub fn with_class_weights(mut self, weights: Option<Vec<f32>>) -> Self {
        self.class_weights = weights;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn HistorySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Optimiser state saved with a previous model.
    pub fn with_optimizer_state(mut self, state: Option<OptimizerState<B>>) -> Self {
        self.resume = state;
        self
    }

    /// The trained model and the optimiser state of the last fitted phase.
    pub fn into_parts(self) -> (Box<FineTuneModel<B>>, Option<OptimizerState<B>>) {
        (self.model, self.optimizer)
    }

    fn take_resume(&mut self, phase: TrainingPhase) -> Option<OptimizerState<B>> {
        if self.resume.as_ref().is_some_and(|s| s.phase() == phase) {
            tracing::info!("Resuming the saved {} optimiser state", phase);
            self.resume.take()
        } else {
            None
        }
    }

    fn trainable_summary(&self) -> (usize, usize) {
        let flags = self.model.layer_flags();
        (flags.iter().filter(|f| f.trainable).count(), flags.len())
    }

    fn refreeze(&mut self, policy: FreezePolicy) {
        let model  = (*self.model).clone().apply_freeze(policy);
        self.model = Box::new(model);
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    /// Freeze the whole backbone; only the head will learn.
    pub fn setup_transfer_learning(&mut self) -> Result<()> {
        self.tracker.enter_transfer_learning()?;
        self.refreeze(FreezePolicy::FreezeBackbone);

        let (on, total) = self.trainable_summary();
        tracing::info!("Transfer learning: {} of {} parameter layers trainable (head only)", on, total);
        Ok(())
    }

    /// Unfreeze every layer at or above the configured threshold.
    pub fn setup_fine_tuning(&mut self) -> Result<()> {
        self.tracker.enter_fine_tuning()?;
        let threshold = self.config.freeze_threshold;
        self.refreeze(FreezePolicy::FreezeBelow(threshold));

        let (on, total) = self.trainable_summary();
        tracing::info!(
            "Fine-tuning: layers >= {} unfrozen, {} of {} parameter layers trainable",
            threshold, on, total
        );
        Ok(())
    }

    /// Run the current phase's full schedule.
    pub fn fit<T, V>(&mut self, train: &mut T, val: &mut V) -> Result<TrainingHistory>
    where
        T: Iterator<Item = Result<ImageBatch<B>>>,
        V: Iterator<Item = Result<ImageBatch<B::InnerBackend>>>,
    {
        let phase = self.tracker.begin_fit()?;

        let (history, state) = match phase {
            TrainingPhase::TransferLearning => {
                // β1 = 0.9, β2 = 0.999, ε = 1e-7
                let mut optim = AdamConfig::new()
                    .with_beta_1(0.9)
                    .with_beta_2(0.999)
                    .with_epsilon(1e-7)
                    .init::<B, FineTuneModel<B>>();
                if let Some(OptimizerState::Adam(record)) = self.take_resume(phase) {
                    optim = optim.load_record(record);
                }
                let lr = self.config.transfer_learning_rate;
                let (history, optim) = self.run_phase(phase, optim, lr, train, val)?;
                (history, OptimizerState::Adam(optim.to_record()))
            }
            TrainingPhase::FineTuning => {
                // v = μ·v + g ; θ = θ - lr·v   (no dampening, no Nesterov)
                let momentum = MomentumConfig::new()
                    .with_momentum(self.config.fine_tune_momentum)
                    .with_dampening(0.0)
                    .with_nesterov(false);
                let mut optim = SgdConfig::new()
                    .with_momentum(Some(momentum))
                    .init::<B, FineTuneModel<B>>();
                if let Some(OptimizerState::Sgd(record)) = self.take_resume(phase) {
                    optim = optim.load_record(record);
                }
                let lr = self.config.fine_tune_learning_rate;
                let (history, optim) = self.run_phase(phase, optim, lr, train, val)?;
                (history, OptimizerState::Sgd(optim.to_record()))
            }
        };

        self.tracker.mark_fitted();
        self.optimizer = Some(state);
        Ok(history)
    }

    /// Close the controller; the model is final from here on.
    pub fn finish(&mut self) -> Result<()> {
        self.tracker.finish()?;
        tracing::info!("Training complete");
        Ok(())
    }

    fn run_phase<O, T, V>(
        &mut self,
        phase: TrainingPhase,
        mut optim: O,
        lr: f64,
        train: &mut T,
        val: &mut V,
    ) -> Result<(TrainingHistory, O)>
    where
        O: Optimizer<FineTuneModel<B>, B>,
        T: Iterator<Item = Result<ImageBatch<B>>>,
        V: Iterator<Item = Result<ImageBatch<B::InnerBackend>>>,
    {
        let schedule = self.schedule;
        let train_loss_fn = CrossEntropyLossConfig::new()
            .with_weights(self.class_weights.clone())
            .init::<B>(&self.device);
        let val_loss_fn = CrossEntropyLossConfig::new().init::<B::InnerBackend>(&self.device);

        tracing::info!(
            "Starting {} phase: {} epochs × {} steps, {} validation batches",
            phase, schedule.epochs, schedule.steps_per_epoch, schedule.validation_batches()
        );

        let mut model   = (*self.model).clone();
        let mut history = TrainingHistory::new(phase);

        for epoch in 1..=schedule.epochs {
            // ── Training steps ────────────────────────────────────────────────
            let pb = progress_bar(schedule.steps_per_epoch, phase, epoch, schedule.epochs)?;
            let mut train_stats = RunningStats::default();

            for _ in 0..schedule.steps_per_epoch {
                let batch = next_batch(train, "training")?;
                let n = batch.len();

                let logits = model.forward(batch.images);
                let loss   = train_loss_fn.forward(logits.clone(), batch.targets.clone());

                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                let correct = count_correct(logits.detach(), batch.targets);

                // Backward pass + optimiser update; frozen layers get no gradient
                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);

                train_stats.add(loss_val, correct, n);
                pb.inc(1);
                pb.set_message(format!("loss={:.4} acc={:.4}", train_stats.loss(), train_stats.accuracy()));
            }
            pb.finish_and_clear();

            // ── Validation ────────────────────────────────────────────────────
            let val_stats = validate(&model, &val_loss_fn, schedule.validation_batches(), val)?;

            let metrics = EpochMetrics::new(
                epoch,
                train_stats.loss(),
                train_stats.accuracy(),
                val_stats.loss(),
                val_stats.accuracy(),
            );

            println!(
                "[{}] Epoch {:>3}/{} | loss={:.4} | acc={:.4} | val_loss={:.4} | val_acc={:.4}",
                phase, epoch, schedule.epochs,
                metrics.loss, metrics.accuracy, metrics.val_loss, metrics.val_accuracy,
            );

            if let Some(sink) = self.sink.as_mut() {
                sink.record(phase, &metrics)?;
            }
            history.record(metrics);
        }

        self.model = Box::new(model);
        Ok((history, optim))
    }
}

/// Run `batches` validation batches with dropout disabled.
fn validate<B, V>(
    model:   &FineTuneModel<B>,
    loss_fn: &CrossEntropyLoss<B::InnerBackend>,
    batches: usize,
    val:     &mut V,
) -> Result<RunningStats>
where
    B: AutodiffBackend,
    V: Iterator<Item = Result<ImageBatch<B::InnerBackend>>>,
{
    // model.valid() → inner backend
    let model = model.valid();
    let mut stats = RunningStats::default();

    for _ in 0..batches {
        let batch  = next_batch(val, "validation")?;
        let n      = batch.len();
        let logits = model.forward(batch.images);

        let loss_val: f64 = loss_fn
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem::<f64>();
        stats.add(loss_val, count_correct(logits, batch.targets), n);
    }
    Ok(stats)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::ValidationStepsMode;
    use crate::ml::{inception::InceptionV3Config, model::FineTuneModelConfig};
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;
    use std::sync::{Arc, Mutex};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_tracker_happy_path() {
        let mut t = PhaseTracker::new();
        t.enter_transfer_learning().unwrap();
        assert_eq!(t.begin_fit().unwrap(), TrainingPhase::TransferLearning);
        t.mark_fitted();
        t.enter_fine_tuning().unwrap();
        assert_eq!(t.begin_fit().unwrap(), TrainingPhase::FineTuning);
        t.mark_fitted();
        t.finish().unwrap();
        assert_eq!(t.state, ControllerState::Done);
    }

    #[test]
    fn test_tracker_rejects_illegal_transitions() {
        let mut t = PhaseTracker::new();
        assert!(t.begin_fit().is_err());
        assert!(t.enter_fine_tuning().is_err());
        assert!(t.finish().is_err());

        t.enter_transfer_learning().unwrap();
        // fine-tuning before the transfer fit
        assert!(t.enter_fine_tuning().is_err());
        t.mark_fitted();
        // the same phase twice
        assert!(t.begin_fit().is_err());
        assert!(t.enter_transfer_learning().is_err());

        t.finish().unwrap();
        assert!(t.begin_fit().is_err());
        assert!(t.enter_fine_tuning().is_err());
    }

    #[test]
    fn test_running_stats_weight_by_batch_size() {
        let mut s = RunningStats::default();
        assert!(s.loss().is_nan());
        assert_eq!(s.accuracy(), 0.0);

        s.add(1.0, 2, 2);
        s.add(4.0, 0, 1);
        assert!((s.loss() - 2.0).abs() < 1e-12);
        assert!((s.accuracy() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_count_correct() {
        let device = Default::default();
        let logits = Tensor::<NdArray, 2>::from_floats([[0.1, 0.9], [0.8, 0.2], [0.3, 0.7]], &device);
        let targets = Tensor::<NdArray, 1, Int>::from_ints([1, 1, 1], &device);
        assert_eq!(count_correct(logits, targets), 2);
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<(TrainingPhase, EpochMetrics)>>>);

    impl HistorySink for SharedSink {
        fn record(&mut self, phase: TrainingPhase, metrics: &EpochMetrics) -> Result<()> {
            self.0.lock().unwrap().push((phase, *metrics));
            Ok(())
        }
    }

    fn controller(schedule: EpochSchedule, config: PhaseConfig) -> TrainingController<TestBackend> {
        let device   = Default::default();
        let backbone = InceptionV3Config::new().init::<TestBackend>(&device);
        let model    = FineTuneModelConfig::new(2).build(backbone, &device).unwrap();
        TrainingController::new(Box::new(model), device, schedule, config)
    }

    fn schedule(epochs: usize, train_samples: usize, batch_size: usize) -> EpochSchedule {
        EpochSchedule::new(epochs, train_samples, 0, batch_size, ValidationStepsMode::Floored)
    }

    #[test]
    fn test_controller_walks_both_phases() {
        let sink = SharedSink::default();
        // zero epochs: the state machine and freezing run without any forward pass
        let mut c = controller(schedule(0, 10, 1), PhaseConfig::new()).with_sink(Box::new(sink.clone()));
        assert!(c.fit(&mut std::iter::empty(), &mut std::iter::empty()).is_err());

        c.setup_transfer_learning().unwrap();
        assert!(c.model.layer_flags().iter().filter(|f| f.in_backbone).all(|f| !f.trainable));
        assert!(c.setup_fine_tuning().is_err());

        let transfer = c.fit(&mut std::iter::empty(), &mut std::iter::empty()).unwrap();
        assert!(transfer.is_empty());
        c.setup_fine_tuning().unwrap();
        for f in c.model.layer_flags() {
            assert_eq!(f.trainable, f.index >= 172);
        }

        let fine_tune = c.fit(&mut std::iter::empty(), &mut std::iter::empty()).unwrap();
        assert_eq!(fine_tune.phase, TrainingPhase::FineTuning);
        c.finish().unwrap();
        assert_eq!(c.tracker.state, ControllerState::Done);
        assert!(sink.0.lock().unwrap().is_empty());

        let (_, state) = c.into_parts();
        assert_eq!(state.map(|s| s.phase()), Some(TrainingPhase::FineTuning));
    }

    #[test]
    fn test_exhausted_pipeline_is_an_error() {
        let mut c = controller(schedule(1, 1, 1), PhaseConfig::new());
        c.setup_transfer_learning().unwrap();
        let err = c.fit(&mut std::iter::empty(), &mut std::iter::empty()).unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn test_restored_optimizer_state_waits_for_its_phase() {
        let sgd = SgdConfig::new().init::<TestBackend, FineTuneModel<TestBackend>>().to_record();
        let mut c = controller(schedule(0, 10, 1), PhaseConfig::new())
            .with_optimizer_state(Some(OptimizerState::Sgd(sgd)));

        c.setup_transfer_learning().unwrap();
        c.fit(&mut std::iter::empty(), &mut std::iter::empty()).unwrap();
        assert_eq!(c.resume.as_ref().map(|s| s.phase()), Some(TrainingPhase::FineTuning));

        c.setup_fine_tuning().unwrap();
        c.fit(&mut std::iter::empty(), &mut std::iter::empty()).unwrap();
        assert!(c.resume.is_none());
    }

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec().unwrap()
    }

    /// Parameters on both sides of the fine-tuning threshold.
    #[derive(Debug, PartialEq)]
    struct Watched {
        stem_conv:  Vec<f32>,
        stem_beta:  Vec<f32>,
        conv_171:   Vec<f32>,
        beta_172:   Vec<f32>,
        top_beta:   Vec<f32>,
        head_dense: Vec<f32>,
    }

    fn watch(model: &FineTuneModel<TestBackend>) -> Watched {
        let b = &model.backbone;
        Watched {
            stem_conv:  values(b.conv2d_1a_3x3.conv.weight.val()),
            stem_beta:  values(b.conv2d_1a_3x3.bn.beta.val()),
            conv_171:   values(b.mixed_6d.branch7x7_2.conv.weight.val()),
            beta_172:   values(b.mixed_6d.branch7x7_2.bn.beta.val()),
            top_beta:   values(b.mixed_7c.branch_pool.bn.beta.val()),
            head_dense: values(model.head.fc1.weight.val()),
        }
    }

    #[test]
    fn test_frozen_layers_survive_real_updates() {
        let device = Default::default();

        // one step of one epoch, no validation; rates large enough to move SGD
        let config = PhaseConfig::new()
            .with_transfer_learning_rate(1e-2)
            .with_fine_tune_learning_rate(1e-1);
        let sink  = SharedSink::default();
        let mut c = controller(schedule(1, 2, 2), config).with_sink(Box::new(sink.clone()));
        assert_eq!(c.model.backbone.mixed_6d.branch7x7_2.index, 171);

        let batch = ImageBatch::<TestBackend> {
            images:  Tensor::random([2, 3, 75, 75], Distribution::Normal(0.0, 1.0), &device),
            targets: Tensor::from_ints([0, 1], &device),
        };
        let mut train = std::iter::repeat_with(|| Ok::<_, anyhow::Error>(batch.clone()));

        // ── Transfer learning: only the head moves ──
        c.setup_transfer_learning().unwrap();
        let before = watch(&c.model);
        let history = c.fit(&mut train, &mut std::iter::empty()).unwrap();
        assert_eq!(history.len(), 1);

        let after = watch(&c.model);
        assert_eq!(after.stem_conv, before.stem_conv);
        assert_eq!(after.stem_beta, before.stem_beta);
        assert_eq!(after.conv_171, before.conv_171);
        assert_eq!(after.beta_172, before.beta_172);
        assert_eq!(after.top_beta, before.top_beta);
        assert_ne!(after.head_dense, before.head_dense);

        // ── Fine-tuning: index >= 172 moves, everything below stays ──
        c.setup_fine_tuning().unwrap();
        let before = after;
        c.fit(&mut train, &mut std::iter::empty()).unwrap();

        let after = watch(&c.model);
        assert_eq!(after.stem_conv, before.stem_conv);
        assert_eq!(after.stem_beta, before.stem_beta);
        assert_eq!(after.conv_171, before.conv_171);
        assert_ne!(after.beta_172, before.beta_172);
        assert_ne!(after.top_beta, before.top_beta);

        c.finish().unwrap();
        let phases: Vec<TrainingPhase> = sink.0.lock().unwrap().iter().map(|(p, _)| *p).collect();
        assert_eq!(phases, vec![TrainingPhase::TransferLearning, TrainingPhase::FineTuning]);

        match c.into_parts().1 {
            Some(OptimizerState::Sgd(record)) => assert!(!record.is_empty()),
            _ => panic!("expected the fine-tuning optimiser state"),
        }
    }
}
