//! # G-buffer
//!
//! The [`RenderTargetSet`] owns one offscreen framebuffer with four color
//! textures and a depth renderbuffer:
//!
//! | slot | attachment        | format | sampler       |
//! |------|-------------------|--------|---------------|
//! | 0    | world position    | RGB16F | `gPosition`   |
//! | 1    | world normal      | RGB16F | `gNormal`     |
//! | 2    | albedo + specular | RGBA8  | `gAlbedoSpec` |
//! | 3    | emission          | RGB8   | `gEmission`   |
//!
//! All attachments share one size, fixed at startup. Completeness is checked
//! once, right after construction; an incomplete framebuffer is a fatal
//! startup error and every object created on the way is released.

use log::{debug, info};

use crate::render::api::{
    ClearFlags, Extent2D, FilterMode, FramebufferId, FramebufferTarget, GraphicsDevice, Rect2D,
    RenderbufferId, TextureDescriptor, TextureFormat, TextureId,
};
use crate::render::{RenderError, RenderResult};

/// One color attachment of the G-buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferAttachment {
    /// World-space position
    Position,
    /// World-space normal
    Normal,
    /// Diffuse color in RGB, specular intensity in A
    AlbedoSpecular,
    /// Emitted color
    Emission,
}

impl GBufferAttachment {
    /// Attachments in slot order
    pub const ALL: [Self; 4] = [Self::Position, Self::Normal, Self::AlbedoSpecular, Self::Emission];

    /// Color attachment index
    pub const fn slot(self) -> u32 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::AlbedoSpecular => 2,
            Self::Emission => 3,
        }
    }

    /// Storage format
    pub const fn format(self) -> TextureFormat {
        match self {
            Self::Position | Self::Normal => TextureFormat::Rgb16F,
            Self::AlbedoSpecular => TextureFormat::Rgba8,
            Self::Emission => TextureFormat::Rgb8,
        }
    }

    /// Sampler uniform the lighting shader reads it through
    pub const fn sampler_name(self) -> &'static str {
        match self {
            Self::Position => "gPosition",
            Self::Normal => "gNormal",
            Self::AlbedoSpecular => "gAlbedoSpec",
            Self::Emission => "gEmission",
        }
    }
}

/// Sizes of every attachment
///
/// [`RenderTargetSet::initialize`] uses one size for everything; a
/// descriptor with per-attachment sizes exists so mismatches can be built on
/// purpose and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    /// Size of each color attachment, indexed by slot
    pub color_extents: [Extent2D; 4],
    /// Size of the depth renderbuffer
    pub depth_extent: Extent2D,
}

impl RenderTargetDescriptor {
    /// Every attachment at `extent`
    pub const fn uniform(extent: Extent2D) -> Self {
        Self {
            color_extents: [extent; 4],
            depth_extent: extent,
        }
    }

    /// Replace the size of one color attachment
    #[must_use]
    pub fn with_color_extent(mut self, attachment: GBufferAttachment, extent: Extent2D) -> Self {
        self.color_extents[attachment.slot() as usize] = extent;
        self
    }

    /// Replace the size of the depth attachment
    #[must_use]
    pub fn with_depth_extent(mut self, extent: Extent2D) -> Self {
        self.depth_extent = extent;
        self
    }

    fn common_extent(&self) -> RenderResult<Extent2D> {
        let expected = self.color_extents[0];
        let mismatched: Vec<String> = GBufferAttachment::ALL
            .iter()
            .zip(self.color_extents)
            .filter(|(_, extent)| *extent != expected)
            .map(|(attachment, extent)| {
                format!("{attachment:?} is {}x{}", extent.width, extent.height)
            })
            .chain((self.depth_extent != expected).then(|| {
                format!("depth is {}x{}", self.depth_extent.width, self.depth_extent.height)
            }))
            .collect();

        if mismatched.is_empty() {
            Ok(expected)
        } else {
            Err(RenderError::FramebufferIncomplete(format!(
                "attachment sizes differ from {}x{}: {}",
                expected.width,
                expected.height,
                mismatched.join(", ")
            )))
        }
    }
}

/// G-buffer framebuffer with its attachments
#[derive(Debug)]
pub struct RenderTargetSet {
    framebuffer: FramebufferId,
    textures: [TextureId; 4],
    depth: RenderbufferId,
    extent: Extent2D,
}

/// Objects created so far, released if construction fails
#[derive(Default)]
struct PartialTargets {
    framebuffer: Option<FramebufferId>,
    textures: Vec<TextureId>,
    depth: Option<RenderbufferId>,
}

impl PartialTargets {
    fn release(self, device: &mut dyn GraphicsDevice) {
        if let Some(framebuffer) = self.framebuffer {
            device.delete_framebuffer(framebuffer);
        }
        for texture in self.textures {
            device.delete_texture(texture);
        }
        if let Some(depth) = self.depth {
            device.delete_renderbuffer(depth);
        }
    }
}

impl RenderTargetSet {
    /// Create a complete G-buffer of `width` x `height`
    pub fn initialize(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<Self> {
        Self::from_descriptor(device, &RenderTargetDescriptor::uniform(Extent2D::new(width, height)))
    }

    /// Create a G-buffer from explicit attachment sizes
    ///
    /// Size disagreements are rejected before any object is created.
    pub fn from_descriptor(
        device: &mut dyn GraphicsDevice,
        descriptor: &RenderTargetDescriptor,
    ) -> RenderResult<Self> {
        let extent = descriptor.common_extent()?;
        let mut created = PartialTargets::default();
        match Self::build(device, descriptor, extent, &mut created) {
            Ok(set) => {
                info!("G-buffer ready: {}x{}, 4 color attachments + depth", extent.width, extent.height);
                Ok(set)
            }
            Err(err) => {
                created.release(device);
                Err(err)
            }
        }
    }

    fn build(
        device: &mut dyn GraphicsDevice,
        descriptor: &RenderTargetDescriptor,
        extent: Extent2D,
        created: &mut PartialTargets,
    ) -> RenderResult<Self> {
        let framebuffer = device.create_framebuffer()?;
        created.framebuffer = Some(framebuffer);

        for attachment in GBufferAttachment::ALL {
            let slot = attachment.slot();
            let texture = device.create_texture(&TextureDescriptor::render_target(
                descriptor.color_extents[slot as usize],
                attachment.format(),
            ))?;
            created.textures.push(texture);
            device.attach_color_texture(framebuffer, slot, texture)?;
            debug!("G-buffer attachment {slot}: {attachment:?} ({:?})", attachment.format());
        }

        let depth = device.create_depth_renderbuffer(descriptor.depth_extent)?;
        created.depth = Some(depth);
        device.attach_depth_renderbuffer(framebuffer, depth)?;

        device.set_draw_buffers(framebuffer, GBufferAttachment::ALL.len() as u32)?;

        let status = device.framebuffer_status(framebuffer);
        if !status.is_complete() {
            return Err(RenderError::FramebufferIncomplete(format!(
                "device reported {status:?}"
            )));
        }

        let textures = [
            created.textures[0],
            created.textures[1],
            created.textures[2],
            created.textures[3],
        ];
        Ok(Self {
            framebuffer,
            textures,
            depth,
            extent,
        })
    }

    /// Size shared by every attachment
    pub const fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Offscreen framebuffer handle
    pub const fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    /// Texture behind one attachment
    pub const fn texture(&self, attachment: GBufferAttachment) -> TextureId {
        self.textures[attachment.slot() as usize]
    }

    /// Depth renderbuffer handle
    pub const fn depth_renderbuffer(&self) -> RenderbufferId {
        self.depth
    }

    /// Route draws into the G-buffer until the returned writer is dropped
    ///
    /// The viewport is set to the G-buffer size for the duration.
    pub fn bind_for_writing<'a>(&self, device: &'a mut dyn GraphicsDevice) -> GBufferWriter<'a> {
        let previous_viewport = device.binding_state().viewport;
        device.bind_framebuffer(FramebufferTarget::Both, Some(self.framebuffer));
        device.set_viewport(Rect2D::from_extent(self.extent));
        GBufferWriter {
            device,
            previous_viewport,
        }
    }

    /// Bind the default framebuffer on both binding points
    pub fn unbind_writing(device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(FramebufferTarget::Both, None);
    }

    /// Bind the four textures to units `start_unit..start_unit + 4`, then reselect unit 0
    pub fn bind_textures_for_reading(&self, device: &mut dyn GraphicsDevice, start_unit: u32) {
        for (offset, texture) in (0u32..).zip(self.textures) {
            device.set_active_texture_unit(start_unit + offset);
            device.bind_texture_2d(Some(texture));
        }
        device.set_active_texture_unit(0);
    }

    /// Clear the units bound by [`Self::bind_textures_for_reading`]
    pub fn unbind_textures(&self, device: &mut dyn GraphicsDevice, start_unit: u32) {
        for offset in 0..self.textures.len() as u32 {
            device.set_active_texture_unit(start_unit + offset);
            device.bind_texture_2d(None);
        }
        device.set_active_texture_unit(0);
    }

    /// Copy the G-buffer depth into `destination` (`None` = default framebuffer)
    ///
    /// Depth only, nearest filtering, full G-buffer rectangle. The default
    /// framebuffer is bound again afterwards.
    pub fn blit_depth_to(&self, device: &mut dyn GraphicsDevice, destination: Option<FramebufferId>) {
        let rect = Rect2D::from_extent(self.extent);
        device.bind_framebuffer(FramebufferTarget::Read, Some(self.framebuffer));
        device.bind_framebuffer(FramebufferTarget::Draw, destination);
        device.blit_framebuffer(rect, rect, ClearFlags::DEPTH, FilterMode::Nearest);
        device.bind_framebuffer(FramebufferTarget::Both, None);
    }

    /// Release every object
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_framebuffer(self.framebuffer);
        for texture in self.textures {
            device.delete_texture(texture);
        }
        device.delete_renderbuffer(self.depth);
        debug!("G-buffer released");
    }
}

/// Scoped G-buffer binding
///
/// Dropping the writer binds the default framebuffer and restores the
/// viewport that was current before [`RenderTargetSet::bind_for_writing`].
pub struct GBufferWriter<'a> {
    device: &'a mut dyn GraphicsDevice,
    previous_viewport: Rect2D,
}

impl GBufferWriter<'_> {
    /// Device to issue G-buffer draws on
    pub fn device(&mut self) -> &mut dyn GraphicsDevice {
        &mut *self.device
    }
}

impl Drop for GBufferWriter<'_> {
    fn drop(&mut self) {
        RenderTargetSet::unbind_writing(self.device);
        self.device.set_viewport(self.previous_viewport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{FramebufferStatus, ResourceCounts};
    use crate::render::backends::HeadlessDevice;

    const DESKTOP: Extent2D = Extent2D::new(1280, 720);

    #[test]
    fn test_desktop_targets_are_complete() {
        let mut device = HeadlessDevice::new(DESKTOP);
        let targets = RenderTargetSet::initialize(&mut device, 1280, 720).unwrap();

        assert_eq!(targets.extent(), DESKTOP);
        assert_eq!(device.framebuffer_status(targets.framebuffer()), FramebufferStatus::Complete);
        for attachment in GBufferAttachment::ALL {
            assert_eq!(device.texture_extent(targets.texture(attachment)), Some(DESKTOP));
        }
        let counts = device.resource_counts();
        assert_eq!((counts.textures, counts.renderbuffers, counts.framebuffers), (4, 1, 1));
        assert!(device.binding_state().is_restored());
    }

    /// Each attachment in turn gets the wrong size.
    #[test]
    fn test_any_mismatched_attachment_is_rejected() {
        let half = Extent2D::new(640, 360);
        let mut descriptors: Vec<RenderTargetDescriptor> = GBufferAttachment::ALL
            .iter()
            .map(|&a| RenderTargetDescriptor::uniform(DESKTOP).with_color_extent(a, half))
            .collect();
        descriptors.push(RenderTargetDescriptor::uniform(DESKTOP).with_depth_extent(half));

        for descriptor in descriptors {
            let mut device = HeadlessDevice::new(DESKTOP);
            let result = RenderTargetSet::from_descriptor(&mut device, &descriptor);
            assert!(matches!(result, Err(RenderError::FramebufferIncomplete(_))));
            assert_eq!(device.resource_counts(), ResourceCounts::default());
            assert!(device.draws().is_empty());
        }
    }

    #[test]
    fn test_device_rejection_releases_everything() {
        let mut device = HeadlessDevice::new(DESKTOP);
        device.force_framebuffer_status(Some(FramebufferStatus::Unsupported));
        let result = RenderTargetSet::initialize(&mut device, 1280, 720);
        match result {
            Err(RenderError::FramebufferIncomplete(reason)) => assert!(reason.contains("Unsupported")),
            other => panic!("expected FramebufferIncomplete, got {other:?}"),
        }
        assert_eq!(device.resource_counts(), ResourceCounts::default());
    }

    #[test]
    fn test_writer_restores_default_framebuffer_and_viewport() {
        let mut device = HeadlessDevice::new(Extent2D::new(1920, 1080));
        let targets = RenderTargetSet::initialize(&mut device, 1280, 720).unwrap();
        {
            let mut writer = targets.bind_for_writing(&mut device);
            let state = writer.device().binding_state();
            assert_eq!(state.draw_framebuffer, Some(targets.framebuffer()));
            assert_eq!(state.viewport, Rect2D::from_extent(DESKTOP));
        }
        let state = device.binding_state();
        assert!(state.is_restored());
        assert_eq!(state.viewport, Rect2D::from_extent(Extent2D::new(1920, 1080)));
    }

    #[test]
    fn test_textures_bound_in_attachment_order() {
        let mut device = HeadlessDevice::new(DESKTOP);
        let targets = RenderTargetSet::initialize(&mut device, 1280, 720).unwrap();
        targets.bind_textures_for_reading(&mut device, 2);
        for attachment in GBufferAttachment::ALL {
            assert_eq!(
                device.texture_on_unit(2 + attachment.slot()),
                Some(targets.texture(attachment))
            );
        }
        assert_eq!(device.binding_state().active_texture_unit, 0);

        targets.unbind_textures(&mut device, 2);
        assert!((2..6).all(|unit| device.texture_on_unit(unit).is_none()));
        assert_eq!(device.binding_state().active_texture_unit, 0);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut device = HeadlessDevice::new(DESKTOP);
        let targets = RenderTargetSet::initialize(&mut device, 1280, 720).unwrap();
        targets.destroy(&mut device);
        assert_eq!(device.resource_counts(), ResourceCounts::default());
    }
}
