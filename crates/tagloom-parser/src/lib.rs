//! Tag resolution for tagloom.
//!
//! Several independent passes scan the same text and each reports candidate
//! tags. The [`Resolver`] merges them into one properly nested document,
//! applying the rules of a [`RuleTable`](tagloom_rules::RuleTable):
//!
//! ```
//! use tagloom_parser::{Candidate, Pass, resolve};
//! use tagloom_rules::{RuleTableBuilder, TagDeclaration};
//!
//! let rules = RuleTableBuilder::new()
//!     .tag(TagDeclaration::new("B"))
//!     .build()
//!     .unwrap();
//! let pass = Pass::new(
//!     "bbcode",
//!     vec![Candidate::start("B", 0, 3).with_end(5, 4)],
//! );
//!
//! let resolution = resolve("[b]hi[/b]", [pass], &rules).unwrap();
//! assert_eq!(resolution.document.to_xml(), "<r><B><s>[b]</s>hi<e>[/b]</e></B></r>");
//! ```
//!
//! Resolution never fails on malformed input. Anything that cannot be
//! placed is discarded and reported in the [`Logger`](tagloom_common::Logger)
//! returned alongside the document.

mod candidate;
mod error;
mod resolver;
mod tag;

pub use candidate::{Candidate, CandidateEnd, LimitAction, Pass, PassId, PassLimit};
pub use error::ResolveError;
pub use resolver::{Resolution, Resolver, resolve};
pub use tag::{SYNTHETIC_PASS, Tag, TagArena, TagId, TagKind, TagType};
