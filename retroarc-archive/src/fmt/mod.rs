//! Concrete format adapters.
//!
//! One module per supported container. Each adapter supplies the
//! constants and byte-layout routines of its format and plugs into
//! the FAT engine (or the fixed engine for in-executable assets);
//! everything else - byte shuffling, offset bookkeeping, sub-stream
//! relocation - is the engines' job. Per-format layouts are
//! documented on the ModdingWiki.

pub mod da_levels;
pub mod dat_hugo;
pub mod dat_wacky;
pub mod exe_ddave;
pub mod gd_doofus;
pub mod glb_raptor;
pub mod hog_descent;
pub mod pcxlib;
pub mod res_stellar7;
pub mod roads_skyroads;
