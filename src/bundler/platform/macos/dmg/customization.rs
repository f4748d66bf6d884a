//! DMG window layout.
//!
//! Handles all appearance customization of the mounted volume:
//! - Copying the background image into `.background`
//! - Installing the custom volume icon
//! - Giving the `Applications` shortcut a custom icon
//! - Laying out the window and icons through a [`LayoutApplier`]
//!
//! [`LayoutPlan`] is the whole input of the applier, so the scripting
//! mechanism can be replaced without touching the layout model.

use super::{staging::APPLICATIONS_LINK, volume::MountedVolume};
use crate::bundler::{
    error::{Error, Result},
    settings::{DmgLayout, Position},
    utils::{ToolCommand, ToolRunner, fs, run_checked},
};
use std::{future::Future, path::Path};

/// Folder inside the volume holding the background picture.
pub const BACKGROUND_DIR: &str = ".background";

/// File Finder reads the custom volume icon from.
pub const VOLUME_ICON_FILE: &str = ".VolumeIcon.icns";

/// Top-left corner of the DMG window on screen.
const WINDOW_ORIGIN: (u32, u32) = (100, 100);

/// One icon placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPlacement {
    pub name: String,
    pub position: Position,
}

/// Everything needed to lay out a mounted volume's window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub volume_name: String,
    /// Window width and height
    pub window: (u32, u32),
    pub icon_size: u32,
    pub text_size: u32,
    /// Background picture file name inside [`BACKGROUND_DIR`]
    pub background: Option<String>,
    /// Icon placements in layout order
    pub items: Vec<IconPlacement>,
}

impl LayoutPlan {
    /// Renders the Finder AppleScript for this plan.
    ///
    /// The output only depends on the plan, so applying it twice yields the
    /// same arrangement.
    pub fn to_applescript(&self) -> String {
        let (width, height) = self.window;
        let (left, top) = WINDOW_ORIGIN;

        let background_clause = match &self.background {
            Some(file) => format!(
                "\n      set background picture of viewOptions to file \"{}:{}\"",
                BACKGROUND_DIR,
                escape_applescript_string(file)
            ),
            None => String::new(),
        };

        let positions: String = self
            .items
            .iter()
            .map(|item| {
                format!(
                    "\n      set position of item \"{}\" of container window to {{{}, {}}}",
                    escape_applescript_string(&item.name),
                    item.position.x,
                    item.position.y
                )
            })
            .collect();

        format!(
            r#"tell application "Finder"
  tell disk "{volume}"
    open
    set current view of container window to icon view
    set toolbar visible of container window to false
    set statusbar visible of container window to false
    set bounds of container window to {{{left}, {top}, {right}, {bottom}}}
    set viewOptions to icon view options of container window
    set arrangement of viewOptions to not arranged
    set icon size of viewOptions to {icon_size}
    set text size of viewOptions to {text_size}{background}{positions}
    close
    open
    update without registering applications
    delay 2
  end tell
end tell
"#,
            volume = escape_applescript_string(&self.volume_name),
            left = left,
            top = top,
            right = left + width,
            bottom = top + height,
            icon_size = self.icon_size,
            text_size = self.text_size,
            background = background_clause,
            positions = positions,
        )
    }
}

/// Escape special characters for AppleScript string literals
///
/// Escapes backslashes and double quotes to prevent script injection
/// and syntax errors when names contain special characters.
///
/// # Examples
/// ```
/// # fn escape_applescript_string(s: &str) -> String {
/// #     s.replace('\\', r"\\").replace('"', r#"\""#)
/// # }
/// assert_eq!(escape_applescript_string("My\"App"), "My\\\"App");
/// assert_eq!(escape_applescript_string("Path\\File"), "Path\\\\File");
/// ```
fn escape_applescript_string(s: &str) -> String {
    s.replace('\\', r"\\").replace('"', r#"\""#)
}

/// Applies a [`LayoutPlan`] to a mounted volume.
pub trait LayoutApplier: Send + Sync {
    fn apply(&self, volume: &Path, plan: &LayoutPlan) -> impl Future<Output = Result<()>> + Send;
}

/// Lays the window out by scripting Finder with `osascript`.
#[derive(Debug, Clone, Copy)]
pub struct FinderLayout<'a, R> {
    runner: &'a R,
}

impl<'a, R: ToolRunner> FinderLayout<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }
}

impl<R: ToolRunner> LayoutApplier for FinderLayout<'_, R> {
    async fn apply(&self, volume: &Path, plan: &LayoutPlan) -> Result<()> {
        log::debug!("Running AppleScript to lay out {}", volume.display());
        let command = ToolCommand::new("osascript")
            .arg("-e")
            .arg(plan.to_applescript());
        run_checked(self.runner, &command).await?;
        Ok(())
    }
}

/// Builds the plan for `volume` and applies it.
///
/// # Process
/// 1. Copy the background picture to `.background/` (skipped with a warning
///    when unset or missing)
/// 2. Copy the volume icon to `.VolumeIcon.icns` and set the custom-icon flag
/// 3. Set the custom `Applications` shortcut icon, if any
/// 4. Run the [`LayoutApplier`]
pub async fn apply_layout<R, L>(
    runner: &R,
    applier: &L,
    volume: &MountedVolume,
    layout: &DmgLayout,
) -> Result<LayoutPlan>
where
    R: ToolRunner,
    L: LayoutApplier,
{
    log::info!("Applying DMG layout...");
    let mount_point = volume.mount_point();

    let background = match layout.background() {
        Some(path) if path.is_file() => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::config("invalid background image path"))?;
            let dest = mount_point.join(BACKGROUND_DIR).join(&file_name);
            fs::copy_file(path, &dest).await?;
            log::debug!("Copied background image to {}", dest.display());
            Some(file_name)
        }
        Some(path) => {
            log::warn!(
                "Background image {} not found, using the default background",
                path.display()
            );
            None
        }
        None => None,
    };

    match layout.volume_icon() {
        Some(icon) if icon.is_file() => install_volume_icon(runner, icon, mount_point).await?,
        Some(icon) => log::warn!("Volume icon {} not found, skipping", icon.display()),
        None => {}
    }

    let has_shortcut = volume
        .entries()
        .iter()
        .any(|entry| entry.name == APPLICATIONS_LINK);
    match layout.applications_icon() {
        Some(icon) if has_shortcut && icon.is_file() => {
            set_applications_icon(runner, icon, &mount_point.join(APPLICATIONS_LINK)).await
        }
        Some(icon) if has_shortcut => {
            log::warn!("Applications icon {} not found, skipping", icon.display())
        }
        _ => {}
    }

    let plan = LayoutPlan {
        volume_name: volume.name().to_string(),
        window: layout.window_size(),
        icon_size: layout.icon_size(),
        text_size: layout.icon_text_size(),
        background,
        items: volume
            .entries()
            .iter()
            .map(|entry| IconPlacement {
                name: entry.name.clone(),
                position: entry.position,
            })
            .collect(),
    };

    applier.apply(mount_point, &plan).await?;

    log::info!("✓ DMG layout applied");
    Ok(plan)
}

async fn install_volume_icon<R: ToolRunner>(runner: &R, icon: &Path, mount_point: &Path) -> Result<()> {
    let dest = mount_point.join(VOLUME_ICON_FILE);
    fs::copy_file(icon, &dest).await?;

    let command = ToolCommand::new("SetFile")
        .args(["-a", "C"])
        .path_arg(mount_point)?;
    match runner.run(&command).await {
        Ok(output) if output.success() => log::debug!("Set custom volume icon"),
        Ok(output) => log::warn!(
            "SetFile could not flag the volume icon: {}",
            output.failure_reason()
        ),
        Err(e) => log::warn!("SetFile unavailable, volume icon may not show: {}", e),
    }
    Ok(())
}

/// AppleScriptObjC setting `icon` as the custom Finder icon of `target`.
fn set_icon_script(icon: &Path, target: &Path) -> String {
    format!(
        r#"use framework "AppKit"
set iconImage to current application's NSImage's alloc()'s initWithContentsOfFile:"{icon}"
current application's NSWorkspace's sharedWorkspace()'s setIcon:iconImage forFile:"{target}" options:0
"#,
        icon = escape_applescript_string(&icon.to_string_lossy()),
        target = escape_applescript_string(&target.to_string_lossy()),
    )
}

/// A failure only costs the custom icon, so it is logged, not returned.
async fn set_applications_icon<R: ToolRunner>(runner: &R, icon: &Path, shortcut: &Path) {
    let command = ToolCommand::new("osascript")
        .arg("-e")
        .arg(set_icon_script(icon, shortcut));
    match runner.run(&command).await {
        Ok(output) if output.success() => log::debug!("Set custom Applications icon"),
        Ok(output) => log::warn!(
            "Could not set the Applications icon: {}",
            output.failure_reason()
        ),
        Err(e) => log::warn!("Could not set the Applications icon: {}", e),
    }
}
