// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from a raw dataset to tensors on the device.
//
//   JSON file / synthetic generator
//       │
//       ▼
//   SequenceSource    → SequenceSet (sequence, time, feature)
//       │
//       ▼
//   Normalization     → optional log1p of intensities
//       │
//       ▼
//   Splitter          → seeded train / dev / test rows
//       │
//       ▼
//   Batcher           → next-step pairs, minibatch plan, dev batch
//       │
//       ▼
//   to_tensor         → burn tensors for the training loop
//
// Reference: ndarray documentation
//            Rust Book §13 (Iterators and Closures)

/// JSON dataset loader and synthetic rain-cell generator
pub mod loader;

/// Log normalization of intensities
pub mod preprocessor;

/// Seeded train/dev/test split
pub mod splitter;

/// Next-step framing, minibatch plan and dev batch layout
pub mod batcher;
