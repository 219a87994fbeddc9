// SPDX-License-Identifier: MIT

//! Tools bundled with the engine

pub mod agent;
pub mod math;
pub mod weather;
