//! Single-frame face emotion analysis.
//!
//! `capture → detection → preprocessing → classification → insight`, composed
//! by [`pipeline::analysis_session::AnalysisSession`].

pub mod capture {
    pub mod domain {
        pub mod capture_guard;
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod ffmpeg_frame_source;
        pub mod image_frame_source;
    }
}

pub mod detection {
    pub mod domain {
        pub mod detector_params;
        pub mod face_locator;
    }
    pub mod infrastructure {
        #[cfg(feature = "opencv")]
        pub mod opencv_face_locator;
    }
}

pub mod preprocessing {
    pub mod frame_preprocessor;
    pub mod normalized_tensor;
}

pub mod classification {
    pub mod domain {
        pub mod emotion;
        pub mod emotion_classifier;
    }
    pub mod infrastructure {
        pub mod execution_provider;
        pub mod onnx_emotion_classifier;
        pub mod placeholder_classifier;
    }
}

pub mod insight {
    pub mod domain {
        pub mod insight_scorer;
    }
}

pub mod pipeline {
    pub mod analysis_config;
    pub mod analysis_session;
    pub mod batch_analyzer;
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod region;
    pub mod resize;
}
