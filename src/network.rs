//! Network orchestration
//!
//! A [`Network`] owns an append-only chain of layers and one optional
//! [`ParameterBlock`] per edge: block `i` connects layer `i - 1` to layer `i`
//! (the first layer and pooling layers have none). Training runs the forward
//! pass, then walks the chain backwards; each layer updates the block of the
//! edge leading to its successor as soon as it has computed its own error, so
//! every call is one step of per-sample gradient descent.
//!
//! If a layer fails partway through the backward pass, the edges already
//! visited keep their updates and the rest stay untouched; the statistics are
//! not recorded for that step.

use crate::config::{validate_config, NetworkConfig};
use crate::error::{Error, Result};
use crate::layers::{Layer, LayerKind};
use crate::parameters::ParameterBlock;
use crate::tensor::{Shape, Tensor};
use crate::utils::{argmax, SimpleRng};
use std::collections::VecDeque;

/// Running correctness and cost counters for reporting.
///
/// The network only ever adds to these; nothing in the crate resets them.
#[derive(Debug, Clone, Default)]
pub struct TrainingStats {
    correct: u64,
    total: u64,
    total_cost: f64,
    iterations: u64,
    correct_history: VecDeque<bool>,
    cost_history: VecDeque<f64>,
    history_capacity: Option<usize>,
}

impl TrainingStats {
    /// Stats whose histories keep at most `history_capacity` entries
    /// (`None` keeps everything, `Some(0)` keeps nothing).
    pub fn new(history_capacity: Option<usize>) -> Self {
        Self {
            history_capacity,
            ..Self::default()
        }
    }

    fn record(&mut self, correct: bool, cost: f64) {
        self.total += 1;
        self.iterations += 1;
        if correct {
            self.correct += 1;
        }
        self.total_cost += cost;

        self.correct_history.push_back(correct);
        self.cost_history.push_back(cost);
        if let Some(capacity) = self.history_capacity {
            while self.correct_history.len() > capacity {
                self.correct_history.pop_front();
            }
            while self.cost_history.len() > capacity {
                self.cost_history.pop_front();
            }
        }
    }

    /// Training samples whose prediction matched the target.
    pub fn correct(&self) -> u64 {
        self.correct
    }

    /// Training samples seen.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Sum of the squared cost of every training sample.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Training steps taken.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Per-sample correctness, oldest first.
    pub fn correct_history(&self) -> &VecDeque<bool> {
        &self.correct_history
    }

    /// Per-sample squared cost, oldest first.
    pub fn cost_history(&self) -> &VecDeque<f64> {
        &self.cost_history
    }

    pub fn history_capacity(&self) -> Option<usize> {
        self.history_capacity
    }

    /// Fraction of training samples predicted correctly; 0 before any training.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Mean squared cost per training sample; 0 before any training.
    pub fn average_cost(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_cost / self.total as f64
        }
    }

    /// Accuracy over the retained correctness history.
    pub fn recent_accuracy(&self) -> f64 {
        if self.correct_history.is_empty() {
            return 0.0;
        }
        let hits = self.correct_history.iter().filter(|&&c| c).count();
        hits as f64 / self.correct_history.len() as f64
    }
}

/// Chain of layers trained with per-sample gradient descent.
///
/// # Example
///
/// ```
/// use rust_conv_networks::layers::{FullyConnected, Input1D, Output};
/// use rust_conv_networks::Network;
///
/// let mut network = Network::new(7);
/// network.add_layer(Input1D::new(3)).unwrap();
/// network.add_layer(FullyConnected::new(4)).unwrap();
/// network.add_layer(Output::new(2)).unwrap();
///
/// for _ in 0..200 {
///     network.train_vector(&[0.5, -0.2, 0.1], 1, 0.1).unwrap();
/// }
/// assert_eq!(network.predict_vector(&[0.5, -0.2, 0.1]).unwrap(), 1);
/// assert_eq!(network.stats().total(), 200);
/// ```
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    parameters: Vec<Option<ParameterBlock>>,
    rng: SimpleRng,
    stats: TrainingStats,
}

impl Network {
    /// Empty network whose weights are drawn from a generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self::from_parts(seed, None)
    }

    /// Empty network seeded and sized from `config`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Config`] if `config` does not validate.
    pub fn with_config(config: &NetworkConfig) -> Result<Self> {
        validate_config(config)?;
        Ok(Self::from_parts(config.seed, config.history_capacity))
    }

    fn from_parts(seed: u64, history_capacity: Option<usize>) -> Self {
        Self {
            layers: Vec::new(),
            parameters: Vec::new(),
            rng: SimpleRng::new(seed),
            stats: TrainingStats::new(history_capacity),
        }
    }

    /// Append `layer` to the chain, binding it to the current tail.
    ///
    /// The first layer must be an input layer and is not bound to anything.
    /// Every later layer is bound to its predecessor (allocating the edge's
    /// parameter block) and the predecessor records it as its successor.
    ///
    /// # Errors
    ///
    /// Fails without changing the chain if the pairing is invalid or a derived
    /// dimension is unusable.
    pub fn add_layer<L: Layer + 'static>(&mut self, layer: L) -> Result<()> {
        self.push_layer(Box::new(layer))
    }

    /// Same as [`add_layer`](Network::add_layer) for an already boxed layer.
    pub fn push_layer(&mut self, mut layer: Box<dyn Layer>) -> Result<()> {
        let block = match self.layers.last_mut() {
            None => {
                if !layer.kind().is_input() {
                    return Err(Error::InvalidLayer(format!(
                        "chain must start with an input layer, got {}",
                        layer.kind()
                    )));
                }
                None
            }
            Some(previous) => {
                let previous_info = previous.info();
                let block = layer.bind(&previous_info, &mut self.rng)?;
                previous.link_next(&layer.info())?;
                block
            }
        };

        log::debug!(
            "bound layer {} ({}) with shape {} and {} parameters",
            self.layers.len(),
            layer.kind(),
            layer.shape(),
            block.as_ref().map_or(0, ParameterBlock::parameter_count)
        );
        self.layers.push(layer);
        self.parameters.push(block);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&dyn Layer> {
        self.layers.get(index).map(|layer| layer.as_ref())
    }

    /// Block of the edge feeding layer `index`, if that layer has one.
    pub fn parameters(&self, index: usize) -> Option<&ParameterBlock> {
        self.parameters.get(index).and_then(Option::as_ref)
    }

    /// Mutable block of the edge feeding layer `index`, for loading weights.
    pub fn parameters_mut(&mut self, index: usize) -> Option<&mut ParameterBlock> {
        self.parameters.get_mut(index).and_then(Option::as_mut)
    }

    /// Total number of weights and biases across all edges.
    pub fn parameter_count(&self) -> usize {
        self.parameters
            .iter()
            .flatten()
            .map(ParameterBlock::parameter_count)
            .sum()
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Shape the first layer expects.
    pub fn input_shape(&self) -> Option<Shape> {
        self.layers.first().map(|layer| layer.shape())
    }

    fn output_size(&self) -> Result<usize> {
        let last = self.layers.last().ok_or(Error::EmptyNetwork)?;
        if last.kind() != LayerKind::Output {
            return Err(Error::MissingOutputLayer(last.kind()));
        }
        Ok(last.shape().volume())
    }

    /// Activations of every layer, in chain order.
    pub fn forward(&self, input: &Tensor) -> Result<Vec<Tensor>> {
        let mut activations: Vec<Tensor> = Vec::with_capacity(self.layers.len());
        for (layer, block) in self.layers.iter().zip(&self.parameters) {
            let source = activations.last().unwrap_or(input);
            let output = layer.forward(source, block.as_ref())?;
            activations.push(output);
        }
        Ok(activations)
    }

    /// Index of the most active output unit (first maximum on ties).
    pub fn predict(&self, input: &Tensor) -> Result<usize> {
        self.output_size()?;
        let activations = self.forward(input)?;
        let output = activations.last().ok_or(Error::EmptyNetwork)?;
        Ok(argmax(output.as_slice()))
    }

    /// [`predict`](Network::predict) for a flat vector, shape (1, 1, N).
    pub fn predict_vector(&self, input: &[f64]) -> Result<usize> {
        self.predict(&Tensor::from_vector(input))
    }

    /// [`predict`](Network::predict) for a single-channel grid, shape (1, W, H).
    pub fn predict_grid(&self, input: &[Vec<f64>]) -> Result<usize> {
        self.predict(&Tensor::from_grid(input)?)
    }

    /// One gradient-descent step on a single sample.
    ///
    /// The target is `+1` at `target` and `-1` elsewhere. Returns the sample's
    /// squared cost `Σ (a - t)²`, which is also added to the statistics along
    /// with whether the prediction matched.
    pub fn train(&mut self, input: &Tensor, target: usize, learning_rate: f64) -> Result<f64> {
        let size = self.output_size()?;
        if target >= size {
            return Err(Error::TargetOutOfRange { target, size });
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::InvalidLearningRate(learning_rate));
        }

        let activations = self.forward(input)?;
        let targets: Vec<f64> = (0..size)
            .map(|i| if i == target { 1.0 } else { -1.0 })
            .collect();
        let output = activations.last().ok_or(Error::EmptyNetwork)?;
        let predicted = argmax(output.as_slice());
        let cost: f64 = output
            .as_slice()
            .iter()
            .zip(&targets)
            .map(|(a, t)| (a - t) * (a - t))
            .sum();

        let mut error = Tensor::from(targets);
        for index in (0..self.layers.len()).rev() {
            let downstream = self
                .parameters
                .get_mut(index + 1)
                .and_then(Option::as_mut);
            match self.layers[index].backward(&activations[index], &error, downstream, learning_rate)? {
                Some(previous_error) => error = previous_error,
                None => break,
            }
        }

        if !cost.is_finite() {
            log::warn!("training step produced non-finite cost {}", cost);
        }
        log::trace!(
            "train step {}: target {}, predicted {}, cost {:.6}",
            self.stats.iterations(),
            target,
            predicted,
            cost
        );
        self.stats.record(predicted == target, cost);
        Ok(cost)
    }

    /// [`train`](Network::train) for a flat vector, shape (1, 1, N).
    pub fn train_vector(&mut self, input: &[f64], target: usize, learning_rate: f64) -> Result<f64> {
        self.train(&Tensor::from_vector(input), target, learning_rate)
    }

    /// [`train`](Network::train) for a single-channel grid, shape (1, W, H).
    pub fn train_grid(&mut self, input: &[Vec<f64>], target: usize, learning_rate: f64) -> Result<f64> {
        self.train(&Tensor::from_grid(input)?, target, learning_rate)
    }
}
