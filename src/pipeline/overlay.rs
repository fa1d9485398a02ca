//! Debug and alert annotations drawn straight into the frame buffer.

use image::Rgb;

use crate::pipeline::{ClassId, Detection};
use crate::source::Frame;

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

const BOX_THICKNESS: i32 = 4;
const LABEL_SCALE: i32 = 2;
const ALERT_SCALE: i32 = 3;
const ALERT_ORIGIN: (i32, i32) = (50, 50);
pub const ALERT_TEXT: &str = "FALL DETECTED";

/// Draws every detection scoring above `draw_threshold`. Unknown classes are
/// drawn too; they just never count towards the fall decision.
pub fn draw_detections(frame: &mut Frame, dets: &[Detection], draw_threshold: f32) -> usize {
    let mut drawn = 0;
    for det in dets.iter().filter(|d| d.confidence > draw_threshold) {
        let color = if det.class == ClassId::Falling { RED } else { GREEN };
        let (x1, y1, x2, y2) = (det.x1 as i32, det.y1 as i32, det.x2 as i32, det.y2 as i32);
        draw_rectangle(frame, x1, y1, x2, y2, color, BOX_THICKNESS);
        let label = format!("{}: {:.2}", det.class.label(), det.confidence);
        draw_text(frame, x1, y1 - 10 - 7 * LABEL_SCALE, &label, color, LABEL_SCALE);
        drawn += 1;
    }
    drawn
}

pub fn draw_alert(frame: &mut Frame) {
    draw_text(frame, ALERT_ORIGIN.0, ALERT_ORIGIN.1, ALERT_TEXT, RED, ALERT_SCALE);
}

fn put(frame: &mut Frame, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

pub fn draw_rectangle(frame: &mut Frame, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>, thickness: i32) {
    for t in 0..thickness {
        for x in x1..=x2 {
            put(frame, x, y1 + t, color);
            put(frame, x, y2 - t, color);
        }
        for y in y1..=y2 {
            put(frame, x1 + t, y, color);
            put(frame, x2 - t, y, color);
        }
    }
}

/// Renders `text` with a 5x7 bitmap font, top-left corner at (x, y).
/// Characters without a glyph leave a blank cell.
pub fn draw_text(frame: &mut Frame, mut x: i32, y: i32, text: &str, color: Rgb<u8>, scale: i32) {
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            put(frame, x + col * scale + dx, y + row as i32 * scale + dy, color);
                        }
                    }
                }
            }
        }
        x += 6 * scale;
    }
}

#[rustfmt::skip]
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        ':' => [0b00000, 0b00100, 0b00100, 0b00000, 0b00100, 0b00100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        _ => return None,
    };
    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class: ClassId, confidence: f32) -> Detection {
        Detection { x1: 10.0, y1: 40.0, x2: 30.0, y2: 60.0, confidence, class }
    }

    #[test]
    fn test_draw_threshold_filters() {
        let mut frame = Frame::new(64, 64);
        let dets = vec![
            det(ClassId::Falling, 0.9),
            det(ClassId::NotFalling, 0.5),
            det(ClassId::Other(3), 0.7),
        ];
        assert_eq!(draw_detections(&mut frame, &dets, 0.5), 2);
        // the unknown class is drawn after the fall box and wins the shared corner
        assert_eq!(frame.get_pixel(10, 40), &GREEN);
    }

    #[test]
    fn test_fall_box_is_red() {
        let mut frame = Frame::new(64, 64);
        draw_detections(&mut frame, &[det(ClassId::Falling, 0.9)], 0.5);
        assert_eq!(frame.get_pixel(20, 41), &RED);
        assert_eq!(frame.get_pixel(20, 50), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_rectangle_clips_to_frame() {
        let mut frame = Frame::new(8, 8);
        draw_rectangle(&mut frame, -5, -5, 20, 20, RED, 2);
        assert_eq!(frame.get_pixel(4, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_alert_text_marks_frame() {
        let mut frame = Frame::new(320, 120);
        draw_alert(&mut frame);
        assert!(frame.pixels().any(|p| *p == RED));
        // 'F' top row is solid
        assert_eq!(frame.get_pixel(50, 50), &RED);
    }

    #[test]
    fn test_alert_on_tiny_frame_does_not_panic() {
        let mut frame = Frame::new(4, 4);
        draw_alert(&mut frame);
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
