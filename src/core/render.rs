//! Plain-text dashboard renderer
//!
//! Pure functions from catalog + view to text; nothing here touches the
//! network or mutates state.

use std::fmt::Write;
use tokio::time::Instant;

use super::{
    catalog::{DeviceCatalog, DeviceKind, IdentityKey},
    settings::{group_icon, input_display_name, DashboardSettings},
    suppression::SuppressionTracker,
    view::{DashboardView, StatusKind, ToggleView},
};
use crate::protocol::matrix::Matrix;

fn switch(toggle: Option<ToggleView>) -> &'static str {
    match toggle {
        Some(ToggleView { enabled: false, .. }) => "[...]",
        Some(ToggleView { on: true, .. }) => "[ON ]",
        _ => "[OFF]",
    }
}

fn status_tag(kind: StatusKind) -> &'static str {
    match kind {
        StatusKind::Info => "..",
        StatusKind::Success => "ok",
        StatusKind::Error => "!!",
    }
}

/// Render the whole dashboard; `settings` supplies input names, group icons
/// and bookmarks.
pub fn render_dashboard(
    catalog: &DeviceCatalog,
    settings: &DashboardSettings,
    view: &DashboardView,
    tracker: &SuppressionTracker,
    now: Instant,
) -> String {
    let mut out = String::new();
    let master = view.master();
    let _ = writeln!(out, "== relaydeck ==  all devices {}", switch(Some(master)));
    if let Some(status) = view.status() {
        let _ = writeln!(out, "[{}] {}", status_tag(status.kind), status.message);
    }

    for endpoint in catalog.endpoints() {
        let address = endpoint.address.as_str();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} ({address}) - {}",
            endpoint.name,
            view.endpoint_status(address)
        );

        for (group, members) in catalog.groups_on(address) {
            let key = IdentityKey::group(address, &group);
            let bookmark = if settings.bookmarks.has_group(address, &group) {
                "*"
            } else {
                " "
            };
            let _ = writeln!(
                out,
                " {bookmark}{} {group} {}",
                group_icon(&settings.group_settings, &key.to_string()),
                switch(view.toggle(&key))
            );

            for device in members {
                let key = device.key();
                let control = match device.kind {
                    DeviceKind::Trigger => "[TRG]",
                    DeviceKind::Toggle => switch(view.toggle(&key)),
                };
                let bookmark = if settings.bookmarks.has_device(address, device.number) {
                    "*"
                } else {
                    " "
                };
                let hold = if tracker.is_suppressed(&key) {
                    " (pending)"
                } else {
                    ""
                };
                let _ = writeln!(
                    out,
                    "   {bookmark}{control} {:>2}  {}{hold}",
                    device.number, device.name
                );
            }
        }

        let inputs: Vec<_> = view.inputs_on(address).collect();
        if !inputs.is_empty() {
            let _ = writeln!(out, "  Inputs:");
            for (number, input) in inputs {
                let flash = if input.is_flashing(now) { " <<" } else { "" };
                let _ = writeln!(
                    out,
                    "    {:<16} {}{flash}",
                    input_display_name(&settings.input_names, address, number),
                    if input.on { "ON" } else { "OFF" }
                );
            }
        }

        if let Some(matrix) = view.matrix(address) {
            render_matrix(&mut out, catalog, settings, address, matrix);
        }
    }

    if !view.response().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Response:");
        for line in view.response().lines() {
            let _ = writeln!(out, "  {line}");
        }
    }

    out
}

/// Render only the matrix block of one endpoint.
pub fn render_matrix_text(
    catalog: &DeviceCatalog,
    settings: &DashboardSettings,
    address: &str,
    matrix: &Matrix,
) -> String {
    let mut out = String::new();
    render_matrix(&mut out, catalog, settings, address, matrix);
    out
}

fn render_matrix(
    out: &mut String,
    catalog: &DeviceCatalog,
    settings: &DashboardSettings,
    address: &str,
    matrix: &Matrix,
) {
    let _ = writeln!(out, "  Matrix:");
    if matrix.is_empty() {
        let _ = writeln!(out, "    (no matrix data)");
        return;
    }

    let inputs = matrix.ordered_inputs();
    let header: Vec<String> = inputs.iter().map(|i| format!("I{i:<2}")).collect();
    let _ = writeln!(out, "    {:<16} {}", "", header.join(" "));

    for output in matrix.ordered_outputs() {
        let label = u8::try_from(output)
            .ok()
            .and_then(|n| catalog.device(address, n))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("Output {output}"));
        let cells: Vec<&str> = inputs
            .iter()
            .map(|i| if matrix.is_connected(output, *i) { " + " } else { " . " })
            .collect();
        let _ = writeln!(out, "    {label:<16} {}", cells.join(" "));
    }

    let legend: Vec<String> = inputs
        .iter()
        .filter_map(|i| u8::try_from(*i).ok())
        .filter(|i| {
            settings
                .input_names
                .get(address)
                .is_some_and(|names| names.contains_key(i))
        })
        .map(|i| format!("I{i} = {}", input_display_name(&settings.input_names, address, i)))
        .collect();
    if !legend.is_empty() {
        let _ = writeln!(out, "    {}", legend.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{catalog::tests::sample_catalog, settings::DeviceRef, view::EndpointStatus};
    use std::time::Duration;

    #[test]
    fn test_render_shows_state_and_pending() {
        let catalog = sample_catalog();
        let mut view = DashboardView::for_catalog(&catalog);
        let tracker = SuppressionTracker::default();
        let lamp = IdentityKey::device("192.168.4.1", 0);

        view.set_on(&lamp, true);
        view.set_endpoint_status("192.168.4.1", EndpointStatus::Connected);
        view.set_status("Command sent to Lamp!", StatusKind::Success);
        tracker.mark_active(&[lamp]);

        let text = render_dashboard(
            &catalog,
            &DashboardSettings::default(),
            &view,
            &tracker,
            Instant::now(),
        );
        assert!(text.contains("[ok] Command sent to Lamp!"));
        assert!(text.contains("Workshop (192.168.4.1) - connected"));
        assert!(text.contains("[ON ]  0  Lamp (pending)"));
        assert!(text.contains("[TRG]  5  Gate"));
        assert!(text.contains("192.168.4.2 (192.168.4.2) - checking"));
    }

    #[test]
    fn test_render_inputs_matrix_and_bookmarks() {
        let catalog = sample_catalog();
        let mut settings = DashboardSettings::default();
        settings
            .input_names
            .entry("192.168.4.1".into())
            .or_default()
            .insert(1, "Door".into());
        settings.bookmarks.devices.push(DeviceRef {
            ip: "192.168.4.1".into(),
            number: 1,
        });

        let mut view = DashboardView::for_catalog(&catalog);
        let now = Instant::now();
        let highlight = Duration::from_millis(4000);
        view.observe_input("192.168.4.1", 1, false, now, highlight);
        view.observe_input("192.168.4.1", 1, true, now, highlight);
        view.set_matrix("192.168.4.1", Matrix::from_rows(&["-+", "--"]));

        let text = render_dashboard(
            &catalog,
            &settings,
            &view,
            &SuppressionTracker::default(),
            now,
        );
        assert!(text.contains("Door"));
        assert!(text.contains(" <<"));
        assert!(text.contains("*[OFF]  1  Strip"));
        assert!(text.contains("I1 = Door"));
        assert!(text.contains("Lamp"));
    }
}
