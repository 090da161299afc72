#![no_std]

// Shared logic for the Modbus sensor simulator.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware and transport collaborators plug in through
// the traits in `registers`, `controller`, and `telemetry`.

pub mod console;
pub mod controller;
pub mod encoder;
pub mod navigation;
pub mod params;
pub mod registers;
pub mod screens;
pub mod serial;
pub mod sync;
pub mod telemetry;
