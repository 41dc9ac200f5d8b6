use anyhow::Result;
use std::sync::Arc;
use webrtc_rs::api::media_engine::{MIME_TYPE_H264, MIME_TYPE_OPUS};
use webrtc_rs::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc_rs::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Camera and microphone toggle state. Turning a device on acquires its
/// outbound track; turning it off drops the track. The engine gets the
/// current track set after every change and re-negotiates from it.
#[derive(Default)]
pub struct MediaToggles {
    camera: Option<Arc<TrackLocalStaticSample>>,
    mic: Option<Arc<TrackLocalStaticSample>>,
}

impl MediaToggles {
    pub fn camera_on(&self) -> bool {
        self.camera.is_some()
    }

    pub fn mic_on(&self) -> bool {
        self.mic.is_some()
    }

    /// Returns the resulting state. Acquisition failure is logged and the
    /// toggle stays off; an existing peer connection is unaffected.
    pub fn toggle_camera(&mut self) -> bool {
        if self.camera.take().is_some() {
            return false;
        }
        match acquire_track(MIME_TYPE_H264, "camera") {
            Ok(track) => {
                self.camera = Some(track);
                true
            }
            Err(err) => {
                tracing::warn!("Camera unavailable: {}", err);
                false
            }
        }
    }

    pub fn toggle_mic(&mut self) -> bool {
        if self.mic.take().is_some() {
            return false;
        }
        match acquire_track(MIME_TYPE_OPUS, "mic") {
            Ok(track) => {
                self.mic = Some(track);
                true
            }
            Err(err) => {
                tracing::warn!("Microphone unavailable: {}", err);
                false
            }
        }
    }

    /// The set of outbound tracks to negotiate right now.
    pub fn tracks(&self) -> Vec<Arc<TrackLocalStaticSample>> {
        self.camera
            .iter()
            .chain(self.mic.iter())
            .cloned()
            .collect()
    }
}

// Device denial surfaces here, before any track exists; the capture
// pipeline feeding samples into the track is a separate concern.
fn acquire_track(mime_type: &str, id: &str) -> Result<Arc<TrackLocalStaticSample>> {
    Ok(Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        },
        id.to_string(),
        "movienight".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggles_flip_and_report_state() {
        let mut media = MediaToggles::default();
        assert!(!media.camera_on());
        assert!(media.toggle_camera());
        assert!(media.camera_on());
        assert!(!media.toggle_camera());
        assert!(!media.camera_on());
    }

    #[test]
    fn test_track_set_follows_toggles() {
        let mut media = MediaToggles::default();
        assert!(media.tracks().is_empty());

        media.toggle_camera();
        assert_eq!(media.tracks().len(), 1);

        media.toggle_mic();
        assert_eq!(media.tracks().len(), 2);

        media.toggle_camera();
        assert_eq!(media.tracks().len(), 1);
    }
}
