// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod broadcast;
pub mod command;
pub mod config;
pub mod error;
pub mod login;
pub mod notify;
pub mod settings;
pub mod status;
pub mod test_support;
pub mod validity;
