//! `.lnk` shortcut creation through the COM `IShellLinkW` interface.

use std::path::Path;

use anyhow::Result;
#[cfg(target_os = "windows")]
use anyhow::Context;
#[cfg(target_os = "windows")]
use tracing::info;

use deploy_platform::shortcut::ShortcutWriter;

pub struct ComShortcutWriter;

impl ComShortcutWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ComShortcutWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "windows")]
impl ShortcutWriter for ComShortcutWriter {
    fn create(&self, link_path: &Path, target: &Path) -> Result<()> {
        use windows::core::{Interface, HSTRING};
        use windows::Win32::Foundation::TRUE;
        use windows::Win32::System::Com::{
            CoCreateInstance, CoInitializeEx, CoUninitialize, IPersistFile, CLSCTX_INPROC_SERVER,
            COINIT_APARTMENTTHREADED,
        };
        use windows::Win32::UI::Shell::{IShellLinkW, ShellLink};

        let target_w = HSTRING::from(target.as_os_str());
        let link_w = HSTRING::from(link_path.as_os_str());

        unsafe {
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .context("CoInitializeEx failed")?;

            let result = (|| -> Result<()> {
                let link: IShellLinkW = CoCreateInstance(&ShellLink, None, CLSCTX_INPROC_SERVER)
                    .context("failed to create ShellLink instance")?;
                link.SetPath(&target_w).context("IShellLinkW::SetPath failed")?;
                link.SetIconLocation(&target_w, 0)
                    .context("IShellLinkW::SetIconLocation failed")?;

                let file: IPersistFile = link.cast().context("ShellLink is not an IPersistFile")?;
                file.Save(&link_w, TRUE)
                    .with_context(|| format!("failed to save shortcut {}", link_path.display()))?;
                Ok(())
            })();

            CoUninitialize();
            result?;
        }

        info!("shortcut {} -> {}", link_path.display(), target.display());
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
impl ShortcutWriter for ComShortcutWriter {
    fn create(&self, _link_path: &Path, _target: &Path) -> Result<()> {
        anyhow::bail!("shortcut creation is only supported on Windows");
    }
}
