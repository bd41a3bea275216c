//! Repair patches for failing plans.
//!
//! A patch is a short list of `replace`/`add` operations on leaf step fields
//! (`/steps/{index}/{field}`). Patches are decoded from untrusted JSON, checked
//! against a fixed allow-list and applied all-or-nothing; the repaired plan is
//! re-validated before it is returned. Step count and step kinds never change.

pub mod apply;
pub mod errors;
pub mod patch;

pub use apply::{apply_patch, check_patch};
pub use errors::PatchRejected;
pub use patch::{
    PatchField, PatchOp, PatchOperation, PatchPath, PatchValue, RepairPatch, MAX_OPERATIONS,
};
