//! Capture backend using the Windows Graphics Capture API.
//!
//! Captures the composited window surface through a D3D11 frame pool and
//! reads it back via a staging texture. Highest-priority backend: it works
//! for occluded windows and hardware-rendered surfaces, but can fail on
//! certain hardware/display-mode combinations, which is why the engine keeps
//! fallbacks behind it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{Direct3D11CaptureFramePool, GraphicsCaptureItem};
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING, D3D11CreateDevice, ID3D11Device,
    ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
};
use windows::Win32::System::WinRT::Direct3D11::CreateDirect3D11DeviceFromDXGIDevice;
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::core::Interface;

use super::{BackendError, BackendKind, CaptureBackend, CaptureResult, CaptureScope};

/// How long to wait for the compositor to deliver the first frame.
const FRAME_WAIT: Duration = Duration::from_secs(5);

/// Windows.Graphics.Capture backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct GraphicsCaptureBackend;

impl GraphicsCaptureBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for GraphicsCaptureBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GraphicsCapture
    }

    fn capture(&self, scope: &CaptureScope) -> Result<CaptureResult, BackendError> {
        let window = match scope {
            CaptureScope::Window(w) => w,
            // WGC monitor capture needs CreateForMonitor plumbing this
            // backend does not carry; the snapshot backend covers it.
            CaptureScope::FullScreen => {
                return Err(BackendError::Unsupported(
                    "full-screen scope not served by graphics capture".into(),
                ));
            }
        };

        let hwnd = HWND(window.handle as usize as *mut std::ffi::c_void);
        capture_window(hwnd).map(|(pixels, width, height)| {
            CaptureResult::new(pixels, width, height, BackendKind::GraphicsCapture)
        })
    }
}

fn capture_window(hwnd: HWND) -> Result<(Vec<u8>, u32, u32), BackendError> {
    let (device, context) = create_d3d11_device()?;
    let item = create_capture_item(hwnd)?;
    let size = item.Size().map_err(wgc_err)?;
    if size.Width <= 0 || size.Height <= 0 {
        return Err(BackendError::Failed(format!(
            "capture item reports degenerate size {}x{}",
            size.Width, size.Height
        )));
    }

    let d3d_device = create_direct3d_device(&device)?;
    let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
        &d3d_device,
        DirectXPixelFormat::B8G8R8A8UIntNormalized,
        1,
        size,
    )
    .map_err(format_err)?;

    let session = frame_pool.CreateCaptureSession(&item).map_err(wgc_err)?;

    let frame_arrived = Arc::new(AtomicBool::new(false));
    let frame_arrived_clone = frame_arrived.clone();
    frame_pool
        .FrameArrived(&TypedEventHandler::new(
            move |_pool: &Option<Direct3D11CaptureFramePool>, _| {
                frame_arrived_clone.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))
        .map_err(wgc_err)?;

    session.StartCapture().map_err(wgc_err)?;

    let start = Instant::now();
    while !frame_arrived.load(Ordering::SeqCst) {
        if start.elapsed() > FRAME_WAIT {
            let _ = session.Close();
            let _ = frame_pool.Close();
            return Err(BackendError::Failed("timeout waiting for frame".into()));
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let frame = frame_pool.TryGetNextFrame().map_err(wgc_err)?;
    let surface = frame.Surface().map_err(wgc_err)?;

    let access: windows::Win32::System::WinRT::Direct3D11::IDirect3DDxgiInterfaceAccess =
        surface.cast().map_err(wgc_err)?;
    let texture: ID3D11Texture2D = unsafe { access.GetInterface().map_err(wgc_err)? };

    let mut desc = D3D11_TEXTURE2D_DESC::default();
    unsafe { texture.GetDesc(&mut desc) };

    let staging_desc = D3D11_TEXTURE2D_DESC {
        Width: desc.Width,
        Height: desc.Height,
        MipLevels: 1,
        ArraySize: 1,
        Format: desc.Format,
        SampleDesc: desc.SampleDesc,
        Usage: D3D11_USAGE_STAGING,
        BindFlags: Default::default(),
        CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
        MiscFlags: Default::default(),
    };

    let staging_texture = unsafe {
        let mut staging: Option<ID3D11Texture2D> = None;
        device
            .CreateTexture2D(&staging_desc, None, Some(&mut staging))
            .map_err(format_err)?;
        staging.ok_or_else(|| BackendError::Failed("failed to create staging texture".into()))?
    };

    unsafe {
        context.CopyResource(
            &staging_texture.cast::<ID3D11Resource>().map_err(wgc_err)?,
            &texture.cast::<ID3D11Resource>().map_err(wgc_err)?,
        );
    }

    let mapped = unsafe {
        let mut mapped = Default::default();
        context
            .Map(
                &staging_texture.cast::<ID3D11Resource>().map_err(wgc_err)?,
                0,
                D3D11_MAP_READ,
                0,
                Some(&mut mapped),
            )
            .map_err(format_err)?;
        mapped
    };

    let width = desc.Width;
    let height = desc.Height;
    let row_pitch = mapped.RowPitch as usize;

    // Copy out row by row, swizzling BGRA -> RGBA; the buffer must be owned
    // before the texture is unmapped.
    let src = unsafe {
        std::slice::from_raw_parts(mapped.pData as *const u8, row_pitch * height as usize)
    };
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    for y in 0..height as usize {
        let src_row = &src[y * row_pitch..y * row_pitch + width as usize * 4];
        let dst_row = &mut pixels[y * width as usize * 4..(y + 1) * width as usize * 4];
        for x in 0..width as usize {
            dst_row[x * 4] = src_row[x * 4 + 2];
            dst_row[x * 4 + 1] = src_row[x * 4 + 1];
            dst_row[x * 4 + 2] = src_row[x * 4];
            dst_row[x * 4 + 3] = src_row[x * 4 + 3];
        }
    }

    unsafe {
        context.Unmap(
            &staging_texture.cast::<ID3D11Resource>().map_err(wgc_err)?,
            0,
        );
    }

    let _ = session.Close();
    let _ = frame_pool.Close();

    Ok((pixels, width, height))
}

fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext), BackendError> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;

    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .map_err(format_err)?;
    }

    Ok((
        device.ok_or_else(|| BackendError::Failed("failed to create D3D11 device".into()))?,
        context.ok_or_else(|| BackendError::Failed("failed to create D3D11 context".into()))?,
    ))
}

fn create_direct3d_device(
    device: &ID3D11Device,
) -> Result<windows::Graphics::DirectX::Direct3D11::IDirect3DDevice, BackendError> {
    let dxgi_device: windows::Win32::Graphics::Dxgi::IDXGIDevice = device.cast().map_err(wgc_err)?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device).map_err(wgc_err)? };
    inspectable.cast().map_err(wgc_err)
}

fn create_capture_item(hwnd: HWND) -> Result<GraphicsCaptureItem, BackendError> {
    let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
    let interop: IGraphicsCaptureItemInterop = unsafe {
        windows::Win32::System::WinRT::RoGetActivationFactory(class_name).map_err(wgc_err)?
    };
    unsafe { interop.CreateForWindow(hwnd).map_err(wgc_err) }
}

fn wgc_err(e: windows::core::Error) -> BackendError {
    BackendError::Failed(e.to_string())
}

/// Device/texture creation failures usually mean the display pipeline
/// negotiated a mode this backend cannot read (bit depth, HDR); classify
/// them so the engine falls through instead of retrying.
fn format_err(e: windows::core::Error) -> BackendError {
    BackendError::FormatIncompatible(e.to_string())
}
