// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod fetch;
pub mod forms;
pub mod grid;
pub mod ids;
pub mod model;
pub mod state;

pub use fetch::*;
pub use forms::*;
pub use grid::*;
pub use ids::*;
pub use model::*;
pub use state::*;
