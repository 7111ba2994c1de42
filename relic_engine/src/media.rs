use std::{cell::RefCell, fmt, rc::Rc};

use serde::Serialize;

/// Movie playback request issued by a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovieRequest {
    pub name: String,
    pub left: i32,
    pub top: i32,
    /// Start and end time within the movie, when only a section is played.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<(u32, u32)>,
    pub blocking: bool,
}

impl MovieRequest {
    pub fn new(name: impl Into<String>, left: i32, top: i32) -> Self {
        MovieRequest {
            name: name.into(),
            left,
            top,
            bounds: None,
            blocking: false,
        }
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn with_bounds(mut self, start: u32, end: u32) -> Self {
        self.bounds = Some((start, end));
        self
    }
}

/// Audio/video/resource side effects requested by scripts. Every method
/// defaults to doing nothing.
pub trait MediaCallback {
    fn play_movie(&self, _request: &MovieRequest) {}
    fn play_sound(&self, _id: u16) {}
    fn set_resource_enabled(&self, _resource: u16, _enabled: bool) {}
    fn redraw_area(&self, _var: u16) {}
    fn load_cursor(&self, _file: &str, _index: i32) {}
}

impl fmt::Debug for dyn MediaCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MediaCallback")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullMedia;

impl MediaCallback for NullMedia {}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaEvent {
    PlayMovie(MovieRequest),
    PlaySound { id: u16 },
    SetResourceEnabled { resource: u16, enabled: bool },
    RedrawArea { var: u16 },
    LoadCursor { file: String, index: i32 },
}

#[derive(Clone, Default)]
pub struct RecordingMediaCallback {
    events: Rc<RefCell<Vec<MediaEvent>>>,
}

impl RecordingMediaCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MediaEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl MediaCallback for RecordingMediaCallback {
    fn play_movie(&self, request: &MovieRequest) {
        self.events
            .borrow_mut()
            .push(MediaEvent::PlayMovie(request.clone()));
    }

    fn play_sound(&self, id: u16) {
        self.events.borrow_mut().push(MediaEvent::PlaySound { id });
    }

    fn set_resource_enabled(&self, resource: u16, enabled: bool) {
        self.events
            .borrow_mut()
            .push(MediaEvent::SetResourceEnabled { resource, enabled });
    }

    fn redraw_area(&self, var: u16) {
        self.events.borrow_mut().push(MediaEvent::RedrawArea { var });
    }

    fn load_cursor(&self, file: &str, index: i32) {
        self.events.borrow_mut().push(MediaEvent::LoadCursor {
            file: file.to_string(),
            index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_callback_tracks_media_events() {
        let callback = RecordingMediaCallback::new();
        callback.play_movie(&MovieRequest::new("stairs", 10, 20).with_bounds(0, 300));
        callback.play_sound(4);
        callback.set_resource_enabled(7, false);
        callback.redraw_area(12);
        callback.load_cursor("cursor.cur", 2);

        assert_eq!(
            callback.events(),
            vec![
                MediaEvent::PlayMovie(MovieRequest {
                    name: "stairs".to_string(),
                    left: 10,
                    top: 20,
                    bounds: Some((0, 300)),
                    blocking: false,
                }),
                MediaEvent::PlaySound { id: 4 },
                MediaEvent::SetResourceEnabled {
                    resource: 7,
                    enabled: false
                },
                MediaEvent::RedrawArea { var: 12 },
                MediaEvent::LoadCursor {
                    file: "cursor.cur".to_string(),
                    index: 2
                },
            ]
        );
    }

    #[test]
    fn shared_recorder_sees_events_from_clones() {
        let recorder = RecordingMediaCallback::new();
        let shared: Rc<dyn MediaCallback> = Rc::new(recorder.clone());
        shared.play_sound(1);
        assert_eq!(recorder.events(), vec![MediaEvent::PlaySound { id: 1 }]);

        let json = serde_json::to_string(&recorder.events()).unwrap();
        assert_eq!(json, r#"[{"kind":"play_sound","id":1}]"#);
    }
}
