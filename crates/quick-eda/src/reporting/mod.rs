//! HTML report generation.
//!
//! The pipeline's [`EdaReport`](crate::EdaReport) is turned into an ordered
//! [`ReportDocument`] (overview, one section per summarized column, one per
//! computed comparison) and written as a single HTML file that references
//! the images under `_visuals/` by relative path.
//!
//! # Example
//!
//! ```rust,ignore
//! use quick_eda::reporting::ReportAssembler;
//!
//! let assembler = ReportAssembler::new(&config);
//! let document = assembler.assemble(&mut report);
//! let path = assembler.write(&document)?;
//! ```

mod assembler;
mod document;
mod html;

pub use assembler::ReportAssembler;
pub use document::{ImageRef, ReportDocument, ReportSection, SectionKind, Table};
pub use html::render_html;
