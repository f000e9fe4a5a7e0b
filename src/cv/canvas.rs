use crate::{
    cv::capture::VideoFrame,
    error::Error,
    media::{Canvas, Color, FontWeight, Rect},
    pose::Point,
};
use opencv::{
    core::{self, Mat, Scalar, Size, CV_8UC3},
    imgproc::{self, FILLED, FONT_HERSHEY_SIMPLEX, INTER_LINEAR, LINE_AA},
    prelude::*,
};

/// Pixel height of Hershey simplex glyphs at font scale 1.
const HERSHEY_HEIGHT: f32 = 22.0;

fn draw_error(e: opencv::Error) -> Error {
    Error::Draw(Box::new(e))
}

fn pixel(point: Point) -> core::Point {
    core::Point::new(point.x.round() as i32, point.y.round() as i32)
}

/// BGR scalar; alpha is applied by blending, not by the scalar.
fn scalar(color: Color) -> Scalar {
    Scalar::new(
        f64::from(color.b),
        f64::from(color.g),
        f64::from(color.r),
        0.0,
    )
}

fn thickness(width: f32) -> i32 {
    (width.round() as i32).max(1)
}

/// [`Canvas`] over an 8-bit BGR `Mat`.
pub struct MatCanvas {
    mat: Mat,
    width: u32,
    height: u32,
}

impl MatCanvas {
    pub const DEFAULT_SIZE: (u32, u32) = (1280, 720);

    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        Ok(Self {
            mat: blank(width, height)?,
            width,
            height,
        })
    }

    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    /// Run `draw` on this canvas, blending the result in with `alpha` when the color is
    /// translucent.
    fn with_alpha<F>(&mut self, alpha: f32, draw: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Mat) -> opencv::Result<()>,
    {
        if alpha >= 1.0 {
            return draw(&mut self.mat).map_err(draw_error);
        }
        let mut overlay = self.mat.try_clone().map_err(draw_error)?;
        draw(&mut overlay).map_err(draw_error)?;
        let mut blended = Mat::default();
        let alpha = f64::from(alpha.max(0.0));
        core::add_weighted(&overlay, alpha, &self.mat, 1.0 - alpha, 0.0, &mut blended, -1)
            .map_err(draw_error)?;
        self.mat = blended;
        Ok(())
    }
}

fn blank(width: u32, height: u32) -> Result<Mat, Error> {
    Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC3, Scalar::all(0.0))
        .map_err(draw_error)
}

impl Canvas for MatCanvas {
    type Frame = VideoFrame;

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.mat = blank(self.width, self.height)?;
        Ok(())
    }

    fn draw_frame(&mut self, frame: &Self::Frame) -> Result<(), Error> {
        imgproc::resize(
            &frame.mat,
            &mut self.mat,
            Size::new(self.width as i32, self.height as i32),
            0.0,
            0.0,
            INTER_LINEAR,
        )
        .map_err(draw_error)
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) -> Result<(), Error> {
        self.with_alpha(color.a, |mat| {
            imgproc::circle(
                mat,
                pixel(center),
                radius.round() as i32,
                scalar(color),
                FILLED,
                LINE_AA,
                0,
            )
        })
    }

    fn stroke_circle(
        &mut self,
        center: Point,
        radius: f32,
        color: Color,
        width: f32,
    ) -> Result<(), Error> {
        self.with_alpha(color.a, |mat| {
            imgproc::circle(
                mat,
                pixel(center),
                radius.round() as i32,
                scalar(color),
                thickness(width),
                LINE_AA,
                0,
            )
        })
    }

    fn line(&mut self, from: Point, to: Point, color: Color, width: f32) -> Result<(), Error> {
        self.with_alpha(color.a, |mat| {
            imgproc::line(
                mat,
                pixel(from),
                pixel(to),
                scalar(color),
                thickness(width),
                LINE_AA,
                0,
            )
        })
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color) -> Result<(), Error> {
        let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
        let (left, top) = (rect.x, rect.y);
        let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
        let fill = scalar(color);

        self.with_alpha(color.a, |mat| {
            let bar = |x0: f32, y0: f32, x1: f32, y1: f32| {
                core::Rect::from_points(pixel(Point::new(x0, y0)), pixel(Point::new(x1, y1)))
            };
            for rect in [
                bar(left + r, top, right - r, bottom),
                bar(left, top + r, right, bottom - r),
            ] {
                imgproc::rectangle(mat, rect, fill, FILLED, LINE_AA, 0)?;
            }
            for &(x, y) in &[
                (left + r, top + r),
                (right - r, top + r),
                (left + r, bottom - r),
                (right - r, bottom - r),
            ] {
                imgproc::circle(
                    mat,
                    pixel(Point::new(x, y)),
                    r.round() as i32,
                    fill,
                    FILLED,
                    LINE_AA,
                    0,
                )?;
            }
            Ok(())
        })
    }

    fn text(
        &mut self,
        text: &str,
        origin: Point,
        size: f32,
        weight: FontWeight,
        color: Color,
    ) -> Result<(), Error> {
        // Hershey fonts only cover ASCII
        let text: String = text.chars().filter(char::is_ascii).collect();
        let text = text.trim_end();
        if text.is_empty() {
            return Ok(());
        }
        let stroke = match weight {
            FontWeight::Regular => 1,
            FontWeight::Bold => 3,
        };
        self.with_alpha(color.a, |mat| {
            imgproc::put_text(
                mat,
                text,
                pixel(origin),
                FONT_HERSHEY_SIMPLEX,
                f64::from(size / HERSHEY_HEIGHT),
                scalar(color),
                stroke,
                LINE_AA,
                false,
            )
        })
    }
}
