//! Binary image composition: stub templates and the composer that patches
//! them and rebuilds the memory image for transfer.
pub mod composer;
pub mod stubs;

pub use composer::{
    ComposeError, ComposeOptions, ComposedImage, EchoRegion, build_boot_stub, build_dsp_stub,
    compose, compute_stack_pointer, finalize_image, locate_injection_site,
};
pub use stubs::{BOOT_STUB_LEN, DSP_STUB_LEN, PORT_SENTINEL};
