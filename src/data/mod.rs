/// Data layer: labeled datasets, assembly from result streams, file formats.
///
/// Architecture:
/// ```text
///   result streams (I1, Q1, I2, …)
///        │
///        ▼
///   ┌──────────┐
///   │ handles   │  stream name → measurement variable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ assemble  │  stack per qubit, label axes → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐        ┌──────────┐
///   │  loader   │ ◀────▶ │ .parquet │  (also .json)
///   └──────────┘        └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  long-format CSV
///   └──────────┘
/// ```

pub mod assemble;
pub mod export;
pub mod handles;
pub mod loader;
pub mod model;
