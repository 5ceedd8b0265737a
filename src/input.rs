use crate::gizmo::GizmoMode;
use crate::props::PropName;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key, NamedKey};

pub struct Input {
    bindings: InputBindings,
    pub mouse_delta: (f32, f32),
    pub wheel: f32,
    cursor_pos: Option<(f32, f32)>,
    left_pressed: bool,
    left_clicked: bool,
    mode_request: Option<GizmoMode>,
    toggle_requests: Vec<PropName>,
    generate_pressed: bool,
    reset_pressed: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(path: impl AsRef<Path>) -> Self {
        Self::with_bindings(InputBindings::load_or_default(path))
    }

    fn with_bindings(bindings: InputBindings) -> Self {
        Self {
            bindings,
            mouse_delta: (0.0, 0.0),
            wheel: 0.0,
            cursor_pos: None,
            left_pressed: false,
            left_clicked: false,
            mode_request: None,
            toggle_requests: Vec::new(),
            generate_pressed: false,
            reset_pressed: false,
        }
    }

    pub fn push(&mut self, ev: InputEvent) {
        match &ev {
            InputEvent::Key { key, pressed } => self.apply_key_binding(key, *pressed),
            InputEvent::MouseMove { dx, dy } => {
                self.mouse_delta.0 += *dx;
                self.mouse_delta.1 += *dy;
            }
            InputEvent::Wheel { delta } => self.wheel += *delta,
            InputEvent::MouseButton { button, pressed } => {
                if *button == MouseButton::Left {
                    if *pressed {
                        self.left_clicked = true;
                        self.left_pressed = true;
                    } else {
                        self.left_pressed = false;
                    }
                }
            }
            InputEvent::CursorPos { x, y } => self.cursor_pos = Some((*x, *y)),
            InputEvent::Other => {}
        }
    }

    /// Edge state is consumed every frame; held state persists.
    pub fn clear_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
        self.wheel = 0.0;
        self.left_clicked = false;
        self.mode_request = None;
        self.toggle_requests.clear();
        self.generate_pressed = false;
        self.reset_pressed = false;
    }

    pub fn take_left_click(&mut self) -> bool {
        let was = self.left_clicked;
        self.left_clicked = false;
        was
    }

    pub fn left_held(&self) -> bool {
        self.left_pressed
    }

    pub fn cursor_position(&self) -> Option<(f32, f32)> {
        self.cursor_pos
    }

    pub fn take_mode_request(&mut self) -> Option<GizmoMode> {
        self.mode_request.take()
    }

    pub fn drain_toggle_requests(&mut self) -> Vec<PropName> {
        std::mem::take(&mut self.toggle_requests)
    }

    pub fn take_generate_pressed(&mut self) -> bool {
        let was = self.generate_pressed;
        self.generate_pressed = false;
        was
    }

    pub fn take_reset_pressed(&mut self) -> bool {
        let was = self.reset_pressed;
        self.reset_pressed = false;
        was
    }

    pub fn consume_wheel_delta(&mut self) -> Option<f32> {
        if self.wheel.abs() > 0.0 {
            let d = self.wheel;
            self.wheel = 0.0;
            Some(d)
        } else {
            None
        }
    }

    fn apply_key_binding(&mut self, key: &Key, pressed: bool) {
        if !pressed {
            return;
        }
        if let Some(binding_key) = InputKeyBinding::from_event_key(key) {
            let actions: Vec<_> = self.bindings.actions_for_key(&binding_key).collect();
            for action in actions {
                self.record_action(action);
            }
        }
    }

    fn record_action(&mut self, action: InputAction) {
        match action {
            InputAction::GizmoTranslate => self.mode_request = Some(GizmoMode::Translate),
            InputAction::GizmoRotate => self.mode_request = Some(GizmoMode::Rotate),
            InputAction::GizmoScale => self.mode_request = Some(GizmoMode::Scale),
            InputAction::ToggleCoffin => self.toggle_requests.push(PropName::Coffin),
            InputAction::ToggleCaldron => self.toggle_requests.push(PropName::Caldron),
            InputAction::TogglePumpkin => self.toggle_requests.push(PropName::Pumpkin),
            InputAction::ToggleWitchHat => self.toggle_requests.push(PropName::WitchHat),
            InputAction::SlimeGenerate => self.generate_pressed = true,
            InputAction::SlimeReset => self.reset_pressed = true,
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::with_bindings(InputBindings::default())
    }
}

#[derive(Debug, Clone)]
struct InputBindings {
    key_to_actions: HashMap<InputKeyBinding, Vec<InputAction>>,
}

impl InputBindings {
    fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<InputConfigFile>(&contents) {
                Ok(config) => Self::from_config(config, &path.display().to_string()),
                Err(err) => {
                    eprintln!(
                        "[input] Failed to parse {}: {err}. Falling back to default bindings.",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    fn from_config(config: InputConfigFile, origin: &str) -> Self {
        Self::with_overrides(config.into_overrides(origin))
    }

    fn with_overrides(overrides: HashMap<InputAction, Vec<InputKeyBinding>>) -> Self {
        let mut action_map = Self::default_action_map();
        for (action, keys) in overrides {
            if keys.is_empty() {
                continue;
            }
            action_map.insert(action, keys);
        }
        Self::from_action_map(action_map)
    }

    fn default_action_map() -> HashMap<InputAction, Vec<InputKeyBinding>> {
        use InputAction::*;
        let mut map = HashMap::new();
        map.insert(GizmoTranslate, vec![InputKeyBinding::character("g")]);
        map.insert(GizmoRotate, vec![InputKeyBinding::character("r")]);
        map.insert(GizmoScale, vec![InputKeyBinding::character("s")]);
        map.insert(ToggleCoffin, vec![InputKeyBinding::character("1")]);
        map.insert(ToggleCaldron, vec![InputKeyBinding::character("2")]);
        map.insert(TogglePumpkin, vec![InputKeyBinding::character("3")]);
        map.insert(ToggleWitchHat, vec![InputKeyBinding::character("4")]);
        map.insert(SlimeGenerate, vec![InputKeyBinding::named(NamedKeyCode::Space)]);
        map.insert(SlimeReset, vec![InputKeyBinding::character("c")]);
        map
    }

    fn from_action_map(action_map: HashMap<InputAction, Vec<InputKeyBinding>>) -> Self {
        let mut key_to_actions: HashMap<InputKeyBinding, Vec<InputAction>> = HashMap::new();
        for (action, keys) in action_map {
            for key in keys {
                key_to_actions.entry(key).or_default().push(action);
            }
        }
        Self { key_to_actions }
    }

    fn actions_for_key(&self, key: &InputKeyBinding) -> impl Iterator<Item = InputAction> + '_ {
        self.key_to_actions.get(key).into_iter().flatten().copied()
    }
}

impl Default for InputBindings {
    fn default() -> Self {
        Self::from_action_map(Self::default_action_map())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InputKeyBinding {
    Character(String),
    Named(NamedKeyCode),
}

impl InputKeyBinding {
    fn character(ch: &str) -> Self {
        Self::Character(ch.to_lowercase())
    }

    fn named(named: NamedKeyCode) -> Self {
        Self::Named(named)
    }

    fn from_event_key(key: &Key) -> Option<Self> {
        match key {
            Key::Character(ch) => {
                let s = ch.to_string();
                if s.is_empty() {
                    None
                } else {
                    Some(Self::Character(s.to_lowercase()))
                }
            }
            Key::Named(named) => NamedKeyCode::from_named_key(named).map(Self::Named),
            _ => None,
        }
    }

    fn from_config_value(raw: &str) -> Result<Self, ()> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(());
        }
        if let Some(named) = NamedKeyCode::from_str(&normalized) {
            return Ok(Self::Named(named));
        }
        if normalized.chars().count() == 1 {
            return Ok(Self::Character(normalized));
        }
        Err(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NamedKeyCode {
    Space,
}

impl NamedKeyCode {
    fn from_named_key(key: &NamedKey) -> Option<Self> {
        match key {
            NamedKey::Space => Some(Self::Space),
            _ => None,
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "space" => Some(Self::Space),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InputAction {
    GizmoTranslate,
    GizmoRotate,
    GizmoScale,
    ToggleCoffin,
    ToggleCaldron,
    TogglePumpkin,
    ToggleWitchHat,
    SlimeGenerate,
    SlimeReset,
}

impl InputAction {
    fn from_str(value: &str) -> Option<Self> {
        match value {
            "gizmo_translate" => Some(Self::GizmoTranslate),
            "gizmo_rotate" => Some(Self::GizmoRotate),
            "gizmo_scale" => Some(Self::GizmoScale),
            "toggle_coffin" => Some(Self::ToggleCoffin),
            "toggle_caldron" => Some(Self::ToggleCaldron),
            "toggle_pumpkin" => Some(Self::TogglePumpkin),
            "toggle_witch_hat" => Some(Self::ToggleWitchHat),
            "slime_generate" => Some(Self::SlimeGenerate),
            "slime_reset" => Some(Self::SlimeReset),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputConfigFile {
    #[serde(default)]
    bindings: HashMap<String, Vec<String>>,
}

impl InputConfigFile {
    fn into_overrides(self, origin: &str) -> HashMap<InputAction, Vec<InputKeyBinding>> {
        let mut overrides = HashMap::new();
        for (action_name, keys) in self.bindings {
            let action_key = action_name.trim().to_lowercase();
            match InputAction::from_str(&action_key) {
                Some(action) => {
                    let mut parsed = Vec::new();
                    for key in keys {
                        match InputKeyBinding::from_config_value(&key) {
                            Ok(binding) => parsed.push(binding),
                            Err(_) => eprintln!(
                                "[input] {origin}: unknown key '{key}' for action '{action_name}', ignoring."
                            ),
                        }
                    }
                    if parsed.is_empty() {
                        eprintln!(
                            "[input] {origin}: action '{action_name}' has no valid keys, keeping defaults."
                        );
                        continue;
                    }
                    overrides.insert(action, parsed);
                }
                None => eprintln!("[input] {origin}: unknown action '{action_name}', ignoring."),
            }
        }
        overrides
    }
}

pub enum InputEvent {
    Key { key: Key, pressed: bool },
    MouseMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    MouseButton { button: MouseButton, pressed: bool },
    CursorPos { x: f32, y: f32 },
    Other,
}

impl InputEvent {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                InputEvent::Wheel { delta: d }
            }
            WindowEvent::CursorMoved { position, .. } => {
                InputEvent::CursorPos { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                InputEvent::MouseButton { button: *button, pressed: *state == ElementState::Pressed }
            }
            WindowEvent::KeyboardInput { event, .. } => InputEvent::Key {
                key: event.logical_key.clone(),
                pressed: event.state == ElementState::Pressed,
            },
            _ => InputEvent::Other,
        }
    }

    pub fn from_device_event(ev: &DeviceEvent) -> Self {
        match ev {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                InputEvent::MouseMove { dx: *dx as f32, dy: *dy as f32 }
            }
            _ => InputEvent::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn press(input: &mut Input, ch: &str) {
        input.push(InputEvent::Key { key: Key::Character(ch.into()), pressed: true });
    }

    #[test]
    fn default_keys_map_to_gizmo_modes() {
        let mut input = Input::new();
        press(&mut input, "r");
        assert_eq!(input.take_mode_request(), Some(GizmoMode::Rotate));
        press(&mut input, "g");
        assert_eq!(input.take_mode_request(), Some(GizmoMode::Translate));
        press(&mut input, "s");
        assert_eq!(input.take_mode_request(), Some(GizmoMode::Scale));
    }

    #[test]
    fn click_edge_is_consumed_once() {
        let mut input = Input::new();
        input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: true });
        assert!(input.take_left_click());
        assert!(!input.take_left_click());
        assert!(input.left_held());
        input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: false });
        assert!(!input.left_held());
    }

    #[test]
    fn bindings_file_overrides_default_keys() {
        let mut file = tempfile::NamedTempFile::new().expect("temp bindings");
        write!(file, r#"{{ "bindings": {{ "gizmo_rotate": ["t"], "bogus_action": ["x"] }} }}"#)
            .expect("write bindings");
        let mut input = Input::from_config(file.path());
        press(&mut input, "t");
        assert_eq!(input.take_mode_request(), Some(GizmoMode::Rotate));
        press(&mut input, "r");
        assert_eq!(input.take_mode_request(), None);
    }

    #[test]
    fn key_release_does_not_fire_actions() {
        let mut input = Input::new();
        input.push(InputEvent::Key { key: Key::Character("3".into()), pressed: false });
        assert!(input.drain_toggle_requests().is_empty());
        press(&mut input, "3");
        assert_eq!(input.drain_toggle_requests(), vec![PropName::Pumpkin]);
    }
}
