// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types and traits that describe the problem:
// sequences of gridded maps and per-epoch results.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O or database calls
//   - Only data types and the traits other layers implement
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Per-epoch result record handed to results sinks
pub mod results;

// Dense (sequence, time, feature) arrays and their map geometry
pub mod sequence;

// Core abstractions (traits) that other layers implement
pub mod traits;
