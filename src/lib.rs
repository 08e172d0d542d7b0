//! Firmware library for a handheld tire-pressure gauge.
//!
//! The gauge reads a BMP280 (ambient temperature and pressure) and a SMP3011
//! (tire pressure) over I²C, shows the readings on an SSD1306 OLED and lets the
//! operator cycle modes and nudge the tire sensor offset with three buttons.
//!
//! Everything in this crate is hardware independent: drivers are generic over
//! `embedded-hal` 1.0 traits and the ESP32 wiring lives in `src/bin/main.rs`.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod bmp280;
pub mod config;
pub mod controller;
pub mod display;
pub mod persist;
pub mod sample;
pub mod smp3011;
