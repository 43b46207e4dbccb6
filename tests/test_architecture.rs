//! Tests for architecture configuration and network building
//!
//! - Parsing every layer tag
//! - Building networks whose derived shapes match the layer rules
//! - Rejecting invalid chains with the offending layer index

use rust_conv_networks::architecture::{
    build_network, load_architecture, parse_architecture, ArchitectureConfig, LayerConfig,
};
use rust_conv_networks::config::NetworkConfig;
use rust_conv_networks::layers::LayerKind;
use rust_conv_networks::{Error, Shape};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("failed to write temp config");
    file
}

fn config_error(contents: &str) -> String {
    match parse_architecture(contents) {
        Err(Error::Config(message)) => message,
        other => panic!("expected a config error, got {:?}", other),
    }
}

// ============================================================================
// Valid Architecture Tests
// ============================================================================

mod valid_architecture_tests {
    use super::*;

    #[test]
    fn test_load_bundled_lenet() {
        let arch = load_architecture("config/architectures/lenet.json").unwrap();
        assert_eq!(arch.layers.len(), 7);
        assert_eq!(arch.layers[0].kind(), LayerKind::Input2D);
        assert_eq!(arch.layers[4].kind(), LayerKind::MeanPooling);
        assert_eq!(arch.layers[6], LayerConfig::Output { size: 10 });
    }

    #[test]
    fn test_load_bundled_mlp() {
        let arch = load_architecture("config/architectures/mlp.json").unwrap();
        assert_eq!(
            arch.layers,
            vec![
                LayerConfig::Input1D { size: 784 },
                LayerConfig::FullyConnected { size: 128 },
                LayerConfig::Output { size: 10 },
            ]
        );
    }

    #[test]
    fn test_every_tag_parses() {
        let file = write_temp_config(
            r#"{ "layers": [
                { "layer_type": "input2d", "depth": 2, "width": 9, "height": 9 },
                { "layer_type": "convolutional", "depth": 3, "kernel_width": 2, "kernel_height": 2 },
                { "layer_type": "max_pooling", "kernel_width": 2, "kernel_height": 2 },
                { "layer_type": "convolutional", "depth": 2, "kernel_width": 1, "kernel_height": 1 },
                { "layer_type": "mean_pooling", "kernel_width": 2, "kernel_height": 2 },
                { "layer_type": "fully_connected", "size": 5 },
                { "layer_type": "output", "size": 3 }
            ] }"#,
        );
        let arch = load_architecture(file.path().to_str().unwrap()).unwrap();
        let kinds: Vec<LayerKind> = arch.layers.iter().map(LayerConfig::kind).collect();
        assert_eq!(
            kinds,
            vec![
                LayerKind::Input2D,
                LayerKind::Convolutional,
                LayerKind::MaxPooling,
                LayerKind::Convolutional,
                LayerKind::MeanPooling,
                LayerKind::FullyConnected,
                LayerKind::Output,
            ]
        );
    }
}

// ============================================================================
// Model Building Tests
// ============================================================================

mod model_building_tests {
    use super::*;

    #[test]
    fn test_build_lenet_shapes() {
        let arch = load_architecture("config/architectures/lenet.json").unwrap();
        let network = build_network(&arch, &NetworkConfig::default()).unwrap();

        let shapes: Vec<Shape> = (0..network.len())
            .map(|i| network.layer(i).unwrap().shape())
            .collect();
        assert_eq!(
            shapes,
            vec![
                Shape::new(1, 28, 28),
                Shape::new(6, 24, 24),
                Shape::new(6, 12, 12),
                Shape::new(16, 8, 8),
                Shape::new(16, 4, 4),
                Shape::vector(84),
                Shape::vector(10),
            ]
        );
        assert_eq!(network.parameters(3).unwrap().dims(), [6, 16, 5, 5]);
        assert_eq!(network.parameters(5).unwrap().dims(), [16, 4, 4, 84]);
    }

    #[test]
    fn test_seed_from_network_config() {
        let arch = load_architecture("config/architectures/mlp.json").unwrap();
        let config = NetworkConfig {
            seed: 9,
            history_capacity: Some(10),
        };
        let a = build_network(&arch, &config).unwrap();
        let b = build_network(&arch, &config).unwrap();

        assert_eq!(a.parameters(1), b.parameters(1));
        assert_eq!(a.stats().history_capacity(), Some(10));
        assert_eq!(a.parameter_count(), 784 * 128 + 128 + 128 * 10 + 10);
    }

    #[test]
    fn test_built_network_trains() {
        let arch = parse_architecture(
            r#"{ "layers": [
                { "layer_type": "input1d", "size": 2 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        )
        .unwrap();
        let mut network = build_network(&arch, &NetworkConfig::default()).unwrap();
        network.train_vector(&[0.3, 0.7], 1, 0.1).unwrap();
        assert_eq!(network.stats().total(), 1);
    }

    #[test]
    fn test_oversized_kernel_fails_at_build() {
        let arch = parse_architecture(
            r#"{ "layers": [
                { "layer_type": "input2d", "depth": 1, "width": 4, "height": 4 },
                { "layer_type": "convolutional", "depth": 1, "kernel_width": 5, "kernel_height": 5 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        )
        .unwrap();
        let result = build_network(&arch, &NetworkConfig::default());
        assert!(matches!(result, Err(Error::InvalidDimension(_))));
    }

    #[test]
    fn test_zero_history_capacity_rejected_at_build() {
        let arch = load_architecture("config/architectures/mlp.json").unwrap();
        let config = NetworkConfig {
            seed: 1,
            history_capacity: Some(0),
        };
        let result = build_network(&arch, &config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unvalidated_config_checked_at_build() {
        let arch = ArchitectureConfig {
            layers: vec![
                LayerConfig::FullyConnected { size: 3 },
                LayerConfig::Output { size: 2 },
            ],
        };
        let result = build_network(&arch, &NetworkConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

// ============================================================================
// Error Handling Tests
// ============================================================================

mod error_handling_tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let result = load_architecture("config/architectures/missing.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_missing_layers_field() {
        assert!(matches!(parse_architecture("{}"), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_layer_field() {
        let result = parse_architecture(
            r#"{ "layers": [ { "layer_type": "input1d" } ] }"#,
        );
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_must_start_with_input() {
        let message = config_error(
            r#"{ "layers": [
                { "layer_type": "fully_connected", "size": 3 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        );
        assert!(message.starts_with("layer 0:"), "{}", message);
    }

    #[test]
    fn test_must_end_with_output() {
        let message = config_error(
            r#"{ "layers": [
                { "layer_type": "input1d", "size": 3 },
                { "layer_type": "fully_connected", "size": 2 }
            ] }"#,
        );
        assert!(message.starts_with("layer 1:"), "{}", message);
    }

    #[test]
    fn test_zero_kernel_rejected() {
        let message = config_error(
            r#"{ "layers": [
                { "layer_type": "input2d", "depth": 1, "width": 4, "height": 4 },
                { "layer_type": "max_pooling", "kernel_width": 0, "kernel_height": 2 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        );
        assert!(message.contains("kernel_width"), "{}", message);
    }
}

// ============================================================================
// Layer Connection Tests
// ============================================================================

mod layer_connection_tests {
    use super::*;

    #[test]
    fn test_convolution_after_dense_rejected() {
        let message = config_error(
            r#"{ "layers": [
                { "layer_type": "input1d", "size": 16 },
                { "layer_type": "convolutional", "depth": 1, "kernel_width": 2, "kernel_height": 2 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        );
        assert!(message.starts_with("layer 1:"), "{}", message);
    }

    #[test]
    fn test_pooling_after_pooling_rejected() {
        let message = config_error(
            r#"{ "layers": [
                { "layer_type": "input2d", "depth": 1, "width": 8, "height": 8 },
                { "layer_type": "convolutional", "depth": 1, "kernel_width": 1, "kernel_height": 1 },
                { "layer_type": "max_pooling", "kernel_width": 2, "kernel_height": 2 },
                { "layer_type": "mean_pooling", "kernel_width": 2, "kernel_height": 2 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        );
        assert!(message.starts_with("layer 3:"), "{}", message);
    }

    #[test]
    fn test_second_input_rejected() {
        let message = config_error(
            r#"{ "layers": [
                { "layer_type": "input1d", "size": 4 },
                { "layer_type": "input1d", "size": 4 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        );
        assert!(message.starts_with("layer 1:"), "{}", message);
    }

    #[test]
    fn test_layer_after_output_rejected() {
        let message = config_error(
            r#"{ "layers": [
                { "layer_type": "input1d", "size": 4 },
                { "layer_type": "output", "size": 2 },
                { "layer_type": "output", "size": 2 }
            ] }"#,
        );
        assert!(message.starts_with("layer 2:"), "{}", message);
    }
}
