/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! JSON shape of probe reports
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::probe_files::{FrameReport, ImageReport};

impl Serialize for FrameReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer
    {
        let region = self.info.region;
        let mut state = serializer.serialize_struct("FrameReport", 8)?;

        state.serialize_field("index", &self.index)?;
        state.serialize_field("x", &region.x)?;
        state.serialize_field("y", &region.y)?;
        state.serialize_field("width", &region.width)?;
        state.serialize_field("height", &region.height)?;
        state.serialize_field("duration_ms", &self.info.duration)?;
        state.serialize_field("disposal", &format!("{:?}", self.info.disposal))?;
        state.serialize_field("blend", &format!("{:?}", self.info.blend))?;

        if let Some(hash) = self.hash {
            state.serialize_field("xxh3", &format!("{hash:016x}"))?;
        }
        state.end()
    }
}

impl Serialize for ImageReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer
    {
        let mut state = serializer.serialize_struct("ImageReport", 10)?;

        state.serialize_field("file", &self.file)?;
        state.serialize_field("format", self.format.name())?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("frame_count", &self.frames.len())?;
        state.serialize_field("animated", &self.animated)?;
        state.serialize_field("loop_count", &self.loop_count)?;
        state.serialize_field("icc_size", &self.icc_size)?;
        state.serialize_field("orientation", &self.orientation)?;
        state.serialize_field("frames", &self.frames)?;

        state.end()
    }
}

#[cfg(test)]
mod tests {
    use loupe_core::bitmap::Rect;
    use loupe_core::frame::{Blend, Disposal, FrameInfo};
    use loupe_image::ImageFormat;
    use serde_json::{json, Value};

    use crate::probe_files::{FrameReport, ImageReport};

    #[test]
    fn report_fields() {
        let report = ImageReport {
            file:        "a.png".to_string(),
            format:      ImageFormat::PNG,
            width:       4,
            height:      3,
            animated:    true,
            loop_count:  Some(0),
            icc_size:    None,
            orientation: Some(6),
            frames:      vec![FrameReport {
                index: 0,
                info:  FrameInfo {
                    region:   Rect::new(1, 2, 3, 1),
                    duration: 40,
                    disposal: Disposal::RestorePrevious,
                    blend:    Blend::SourceOver
                },
                hash:  Some(0xAB)
            }]
        };
        let value: Value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["format"], "PNG");
        assert_eq!(value["frame_count"], 1);
        assert_eq!(value["loop_count"], 0);
        assert_eq!(value["icc_size"], Value::Null);
        assert_eq!(value["orientation"], 6);
        assert_eq!(
            value["frames"][0],
            json!({
                "index": 0,
                "x": 1,
                "y": 2,
                "width": 3,
                "height": 1,
                "duration_ms": 40,
                "disposal": "RestorePrevious",
                "blend": "SourceOver",
                "xxh3": "00000000000000ab"
            })
        );
    }
}
