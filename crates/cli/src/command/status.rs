// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vtm status` — print token status once.

use std::sync::Arc;

use super::App;
use crate::status::StatusView;

pub fn run(app: &App) -> anyhow::Result<i32> {
    let view = StatusView::new(Arc::clone(&app.settings), &app.supervisor, std::io::stdout());
    let status = view.render()?;
    Ok(if status.is_valid() { 0 } else { 1 })
}
