//! Windows Graphics Capture backend, one session per monitor

use crate::monitor::enumerate_monitors;
use crate::{
    CaptureError, CaptureResult, D3D11Device, FrameData, FrameSource, FrameSourceFactory,
    MonitorInfo, Rect,
};
use tracing::{debug, instrument};
use windows::{
    Graphics::Capture::{
        Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
        GraphicsCaptureSession,
    },
    Graphics::DirectX::Direct3D11::IDirect3DSurface,
    Graphics::DirectX::DirectXPixelFormat,
    Graphics::SizeInt32,
    Win32::Graphics::Direct3D11::{
        ID3D11Texture2D, D3D11_BOX, D3D11_CPU_ACCESS_READ, D3D11_MAPPED_SUBRESOURCE,
        D3D11_MAP_READ, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
    },
    Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC},
    Win32::Graphics::Gdi::HMONITOR,
    Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop,
    Win32::System::WinRT::{RoInitialize, RO_INIT_MULTITHREADED},
};

const PIXEL_FORMAT: DirectXPixelFormat = DirectXPixelFormat::B8G8R8A8UIntNormalized;
const POOL_BUFFERS: i32 = 2;

struct Staging {
    texture: ID3D11Texture2D,
    width: u32,
    height: u32,
}

/// Live WGC session on one monitor.
pub struct WgcFrameSource {
    monitor_index: usize,
    device: D3D11Device,
    session: GraphicsCaptureSession,
    frame_pool: Direct3D11CaptureFramePool,
    size: SizeInt32,
    staging: Option<Staging>,
}

impl WgcFrameSource {
    #[instrument(skip(monitor), fields(index = monitor.index))]
    pub fn new(monitor: &MonitorInfo) -> CaptureResult<Self> {
        let device = D3D11Device::new()?;
        let item = create_monitor_item(monitor.handle)?;
        let size = item.Size()?;

        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            device.d3d_device(),
            PIXEL_FORMAT,
            POOL_BUFFERS,
            size,
        )?;
        let session = frame_pool.CreateCaptureSession(&item)?;

        // Both are missing on older Windows 10 builds.
        if let Err(e) = session.SetIsBorderRequired(false) {
            debug!("capture border stays on: {e}");
        }
        if let Err(e) = session.SetIsCursorCaptureEnabled(false) {
            debug!("cursor capture stays on: {e}");
        }

        session.StartCapture()?;

        Ok(Self {
            monitor_index: monitor.index,
            device,
            session,
            frame_pool,
            size,
            staging: None,
        })
    }

    /// Newest frame in the pool; older ones are dropped.
    fn latest_frame(&self) -> Option<Direct3D11CaptureFrame> {
        let mut latest = None;
        while let Ok(frame) = self.frame_pool.TryGetNextFrame() {
            latest = Some(frame);
        }
        latest
    }

    fn staging_texture(&mut self, width: u32, height: u32) -> CaptureResult<ID3D11Texture2D> {
        if let Some(staging) = &self.staging {
            if staging.width == width && staging.height == height {
                return Ok(staging.texture.clone());
            }
        }

        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };

        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe {
            self.device
                .device()
                .CreateTexture2D(&desc, None, Some(&mut texture))?;
        }
        let texture =
            texture.ok_or_else(|| CaptureError::D3D11("staging texture not created".into()))?;

        self.staging = Some(Staging {
            texture: texture.clone(),
            width,
            height,
        });
        Ok(texture)
    }

    fn copy_region(&mut self, surface: &IDirect3DSurface, rect: Rect) -> CaptureResult<FrameData> {
        let source: ID3D11Texture2D = D3D11Device::dxgi_interface(surface)?;
        let staging = self.staging_texture(rect.width, rect.height)?;
        let context = self.device.context();

        let src_box = D3D11_BOX {
            left: rect.x as u32,
            top: rect.y as u32,
            front: 0,
            right: rect.right() as u32,
            bottom: rect.bottom() as u32,
            back: 1,
        };

        unsafe {
            context.CopySubresourceRegion(&staging, 0, 0, 0, 0, &source, 0, Some(&src_box));

            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            context.Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;

            let row_pitch = mapped.RowPitch as usize;
            let row_bytes = rect.width as usize * 4;
            let mut data = Vec::with_capacity(row_bytes * rect.height as usize);
            for y in 0..rect.height as usize {
                let row = std::slice::from_raw_parts(
                    (mapped.pData as *const u8).add(y * row_pitch),
                    row_bytes,
                );
                data.extend_from_slice(row);
            }

            context.Unmap(&staging, 0);

            Ok(FrameData::new(data, rect.width, rect.height))
        }
    }
}

impl FrameSource for WgcFrameSource {
    fn monitor_index(&self) -> usize {
        self.monitor_index
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.size.Width.max(0) as u32, self.size.Height.max(0) as u32)
    }

    fn grab(&mut self, rect: Rect) -> CaptureResult<Option<FrameData>> {
        let Some(frame) = self.latest_frame() else {
            return Ok(None);
        };

        let content = frame.ContentSize()?;
        if content != self.size {
            debug!(
                width = content.Width,
                height = content.Height,
                "monitor resolution changed, recreating frame pool"
            );
            self.frame_pool.Recreate(
                self.device.d3d_device(),
                PIXEL_FORMAT,
                POOL_BUFFERS,
                content,
            )?;
            self.size = content;
            // This frame still has the old size; wait for one from the new pool.
            let _ = frame.Close();
            return Ok(None);
        }

        let (width, height) = self.dimensions();
        let rect = rect
            .intersection(&Rect::new(0, 0, width, height))
            .ok_or(CaptureError::InvalidRect(rect))?;

        let surface = frame.Surface()?;
        let data = self.copy_region(&surface, rect)?;
        let _ = frame.Close();
        Ok(Some(data))
    }
}

impl Drop for WgcFrameSource {
    fn drop(&mut self) {
        let _ = self.session.Close();
        let _ = self.frame_pool.Close();
    }
}

/// Creates [`WgcFrameSource`]s by monitor enumeration index.
#[derive(Debug, Default)]
pub struct WgcSourceFactory;

impl FrameSourceFactory for WgcSourceFactory {
    type Source = WgcFrameSource;

    fn init_thread(&mut self) -> CaptureResult<()> {
        unsafe { RoInitialize(RO_INIT_MULTITHREADED)? };
        Ok(())
    }

    fn create(&mut self, monitor_index: usize) -> CaptureResult<WgcFrameSource> {
        if !GraphicsCaptureSession::IsSupported().unwrap_or(false) {
            return Err(CaptureError::NotSupported);
        }

        let monitors = enumerate_monitors();
        let monitor = monitors
            .get(monitor_index)
            .ok_or(CaptureError::MonitorNotFound(monitor_index))?;

        WgcFrameSource::new(monitor)
    }
}

fn create_monitor_item(hmonitor: isize) -> CaptureResult<GraphicsCaptureItem> {
    unsafe {
        let interop: IGraphicsCaptureItemInterop =
            windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()?;
        let item: GraphicsCaptureItem = interop.CreateForMonitor(HMONITOR(hmonitor as _))?;
        Ok(item)
    }
}
