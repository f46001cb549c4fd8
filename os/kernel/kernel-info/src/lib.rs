//! # Kernel Configuration
//!
//! Compile-time constants shared by the kernel's resource managers. This
//! crate is the single source of truth for sizing: the buffer cache and the
//! frame allocator take these values as defaults for their const generic
//! parameters, and tests shrink them by instantiating with smaller values.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! * **Page size**: the 4 KiB frame granularity of the physical allocator
//! * **Managed range**: `[PHYS_LOAD, PHYS_TOP)`, the physical RAM owned by the
//!   frame allocator (the kernel image at the bottom stays reserved)
//! * **HHDM**: the higher-half direct map through which frame contents are
//!   addressed
//!
//! ### Tunables ([`param`])
//! * **Cores**: how many per-core free lists exist
//! * **Buffer cache**: block size, buffer count, bucket count
//! * **Allocator**: steal quota and the fill bytes used to scrub frames
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (reserved, never freed)       │
//!             ├─────────────────────────────────┤
//!             │    Available RAM                │
//!             │  (per-core free lists)          │
//! PHYS_TOP    └─────────────────────────────────┘
//! ```
//!
//! All values are validated by `const` assertions, so a bad configuration
//! fails the build rather than the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
pub mod param;
