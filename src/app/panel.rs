use crate::gizmo::SelectionState;
use crate::props::PropName;
use crate::session::{GlobeSession, SessionCommand};

/// Snapshot of the session state the panel renders from. Taken before the
/// egui pass so the closure borrows nothing mutable.
pub(super) struct PanelView {
    props: Vec<(PropName, bool, bool)>,
    slime_count: usize,
    mode_label: &'static str,
    axes_label: String,
    selection_label: String,
}

impl PanelView {
    pub(super) fn from_session(session: &GlobeSession) -> Self {
        let props = PropName::ALL
            .iter()
            .filter(|name| name.pickable())
            .map(|&name| (name, session.prop_registered(name), session.prop_visible(name)))
            .collect();
        let axes = session.gizmo_axes();
        let mut axes_label = String::new();
        for (enabled, tag) in [(axes.x, "X"), (axes.y, "Y"), (axes.z, "Z")] {
            if enabled {
                axes_label.push_str(tag);
            }
        }
        let selection_label = match session.selection() {
            SelectionState::Attached { prop, .. } => prop.label().to_string(),
            SelectionState::Detached => "none".to_string(),
        };
        Self {
            props,
            slime_count: session.slime_count(),
            mode_label: session.gizmo_mode().label(),
            axes_label,
            selection_label,
        }
    }
}

pub(super) fn draw(ctx: &egui::Context, view: &PanelView, commands: &mut Vec<SessionCommand>) {
    egui::SidePanel::right("globe_panel").default_width(220.0).show(ctx, |ui| {
        ui.heading("Halloween globe");
        ui.separator();
        for &(name, registered, visible) in &view.props {
            let mut checked = visible;
            let label =
                if registered { name.label().to_string() } else { format!("{} (loading)", name.label()) };
            if ui.add_enabled(registered, egui::Checkbox::new(&mut checked, label)).changed() {
                commands.push(SessionCommand::ToggleProp(name));
            }
        }
        ui.separator();
        ui.label(format!("Slime: {}", view.slime_count));
        ui.horizontal(|ui| {
            if ui.button("Generate slime").clicked() {
                commands.push(SessionCommand::GenerateSlime);
            }
            if ui.button("Reset slime").clicked() {
                commands.push(SessionCommand::ResetSlime);
            }
        });
        ui.separator();
        ui.label(format!("Gizmo: {} [{}]  (g/r/s)", view.mode_label, view.axes_label));
        ui.label(format!("Selected: {}", view.selection_label));
    });
}
