mod mask;

pub use mask::{
    mask_to_gray, mask_to_overlay, render_mask, render_overlay, MASK_OFF, MASK_ON,
    OVERLAY_BACKGROUND, OVERLAY_VEGETATION,
};
