pub mod batch;
pub mod csv;

pub use self::batch::{
    RefundBatch, build_refund_batch, note_preimage_extrinsic, treasury_account, write_preimage,
};
pub use self::csv::{Role, current_role};
