pub mod api;
#[cfg(feature = "frb-codegen")]
mod frb_generated;
