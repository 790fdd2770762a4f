#![warn(clippy::all)]
#![doc = include_str!("../README.md")]

// Modules that make up the Rowpick library.
mod args;
mod clipboard;
mod data;
mod error;
mod filter;
mod footer;
mod help;
mod highlight;
mod ingest;
mod input;
mod keymap;
mod persist;
mod picker;
mod refresh;
mod render;
mod search;
mod select;
mod settings;
mod sort;
mod term;
mod theme;
mod viewport;

// Publicly expose the contents of these modules.
pub use self::{
    // add to lib
    args::Arguments,
    clipboard::*,
    data::*,
    error::*,
    filter::*,
    footer::*,
    help::*,
    highlight::*,
    ingest::*,
    input::*,
    keymap::*,
    persist::*,
    picker::*,
    refresh::*,
    search::*,
    select::*,
    settings::*,
    sort::*,
    term::*,
    theme::*,
    viewport::*,
};
