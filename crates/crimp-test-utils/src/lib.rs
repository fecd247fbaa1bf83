// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities: mock external collaborators and a full-stack harness.

pub mod harness;
pub mod mock_channel;
pub mod mock_sheets;

pub use harness::TestHarness;
pub use mock_channel::MockChat;
pub use mock_sheets::{MockExporter, MockRenderer, MockSheets};
