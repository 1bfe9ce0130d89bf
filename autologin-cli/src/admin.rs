//! Privilege check. Synthesizing input into an elevated full-screen
//! process needs an elevated token of our own.

use anyhow::Result;

#[cfg(target_os = "windows")]
pub fn ensure_elevated() -> Result<()> {
    if is_elevated()? {
        Ok(())
    } else {
        anyhow::bail!(
            "administrator privileges are required to drive the game window; \
             re-run from an elevated shell"
        )
    }
}

#[cfg(not(target_os = "windows"))]
pub fn ensure_elevated() -> Result<()> {
    tracing::warn!("privilege check skipped on this platform");
    Ok(())
}

#[cfg(target_os = "windows")]
fn is_elevated() -> Result<bool> {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{
        GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token = HANDLE::default();
        OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token)
            .map_err(|e| anyhow::anyhow!("failed to open the process token: {e}"))?;

        let mut elevation = TOKEN_ELEVATION::default();
        let mut length = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
        let queried = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            length,
            &mut length,
        );
        let _ = CloseHandle(token);
        queried.map_err(|e| anyhow::anyhow!("failed to query token elevation: {e}"))?;

        Ok(elevation.TokenIsElevated != 0)
    }
}
