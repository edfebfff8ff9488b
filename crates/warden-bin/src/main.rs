// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Warden - moderation bot
//!
//! Main binary entry point.

use warden_bin::error::report_error_and_exit;
use warden_bin::{Cli, commands};

fn main() {
    let cli = Cli::parse_args();

    if let Err(error) = commands::execute(cli) {
        report_error_and_exit(error);
    }
    std::process::exit(0);
}
