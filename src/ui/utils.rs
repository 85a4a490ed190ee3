use egui::Response;

/// +1 / -1 for a mouse wheel tick over `resp`
pub fn scroll_step(ui: &egui::Ui, resp: &Response) -> Option<isize> {
    if !resp.hovered() {
        return None;
    }

    let delta = ui.input(|i| {
        i.events.iter().find_map(|e| match e {
            egui::Event::MouseWheel {
                unit: _,
                delta,
                modifiers,
            } => Some(*delta),
            _ => None,
        })
    })?;

    wheel_direction(delta.y)
}

pub fn wheel_direction(dy: f32) -> Option<isize> {
    if dy > 0. {
        Some(1)
    } else if dy < 0. {
        Some(-1)
    } else {
        None
    }
}

/// `...` plus the last `n` characters
pub fn truncate_front(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if len <= n {
        return s.to_string();
    }
    let tail: String = s.chars().skip(len - n).collect();
    format!("...{}", tail)
}

pub fn color32(rgb: [u8; 3], alpha: f32) -> egui::Color32 {
    let a = (alpha.clamp(0., 1.) * 255.) as u8;
    egui::Color32::from_rgba_unmultiplied(rgb[0], rgb[1], rgb[2], a)
}
