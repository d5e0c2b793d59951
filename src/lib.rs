//! # dci-bundle
//!
//! Exports icon artboards as themeable DCI icon bundles and turns existing
//! bundles back into an inspectable preview.
//!
//! An icon is a set of artboards named `D/<icon>/<Mode>[/Light|/Dark][/Background]`.
//! Each artboard's background color says which theme it draws for, its export
//! formats say which pixel ratios to produce, and per-artboard settings in the
//! document carry padding and a palette role. Export turns every icon into a
//! directory tree and hands it to the external `dci` packager:
//!
//! ```text
//! gear/36/normal.light/2/1.0.png          real file
//! gear/36/normal.dark/2/1.0.png  →  ../../normal.light/2/1.0.png
//! ```
//!
//! # Pipeline
//!
//! ```text
//! export   document → classify → stage (tmp) → dci --create → <icon>.dci
//! open     <icon>.dci → dci --export (tmp) → decode → layout → preview.json/png
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Parse, render and rename `D/<icon>/<Mode>/...` artboard names |
//! | [`palette`] | Palette role, color adjustments and padding in the settings store |
//! | [`scale`] | Pixel ratios and formats from artboard export declarations |
//! | [`layout`] | The encoder: theme fan-out, file naming, links, alpha8 substitution |
//! | [`decode`] | Unpacked bundle tree → grouped, laid-out preview model |
//! | [`tools`] | `dci` and `dci-image-converter` subprocess wrappers |
//! | [`render`] | Raster export of artboards and preview composition |
//! | [`export`] | Per-icon orchestration of export and open |
//! | [`template`] | Create the artboards of a new icon; rename icons |
//! | [`document`] | The JSON host document and its settings store |
//! | [`config`] | `dci-bundle.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Encode, Many References
//!
//! A generic artboard looks the same in light and dark themes. It is encoded
//! once into the `.light` directory and the `.dark` directory gets a relative
//! symbolic link, so bundles never carry the same image twice. On platforms
//! without symlinks the file is copied instead.
//!
//! ## Collaborators Behind Traits
//!
//! Rendering, packaging, alpha conversion and overwrite prompts are traits
//! ([`render::Renderer`], [`tools::Packager`], [`tools::AlphaConverter`],
//! [`export::Prompter`]). The encoder never spawns a process or touches a
//! terminal itself, which keeps every layout rule testable with recording
//! mocks.
//!
//! ## Sequential by Construction
//!
//! Each icon blocks on an external process. Icons are exported one after
//! another, each in its own temporary directory that is dropped when the
//! icon is done.

pub mod config;
pub mod decode;
pub mod document;
pub mod export;
pub mod layout;
pub mod naming;
pub mod output;
pub mod palette;
pub mod render;
pub mod scale;
pub mod template;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_helpers;
