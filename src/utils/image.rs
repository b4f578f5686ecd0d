use anyhow::Error;
use ndarray::{Array3, Array4, Axis};
use opencv::core::{Mat, MatTraitConst, Rect, Scalar, Size, Vec3b, Vector, CV_8UC3};
use opencv::imgcodecs::{imdecode, IMREAD_COLOR};
use opencv::imgproc::{self, cvt_color_def, resize, COLOR_BGR2RGB};

/// decode_rgb_image decodes JPEG/PNG bytes into an RGB matrix.
///
/// # Arguments
/// * `im_bytes` - encoded image bytes
///
/// # Returns
/// * `Result<Mat, Error>`
pub fn decode_rgb_image(im_bytes: &[u8]) -> Result<Mat, Error> {
    if im_bytes.is_empty() {
        return Err(Error::msg("image buffer is empty"))
    }

    let buffer = Vector::<u8>::from_slice(im_bytes);
    let img_as_arr_bgr = imdecode(&buffer, IMREAD_COLOR)?;
    if img_as_arr_bgr.empty() {
        return Err(Error::msg("image bytes are not a supported image format"))
    }

    let mut img_as_arr_rgb = Mat::default();
    cvt_color_def(&img_as_arr_bgr, &mut img_as_arr_rgb, COLOR_BGR2RGB)?;
    Ok(img_as_arr_rgb)
}

/// letterbox resizes the image into the target size keeping its aspect ratio.
///
/// The image is anchored top-left and the remainder is zero padded, so a
/// model input coordinate maps back to the source image by dividing by the
/// resize ratio on both axes.
///
/// # Arguments
/// * `img` - OpenCV matrix (3 channels)
/// * `target` - (width, height) of the model input
///
/// # Returns
/// * `Result<(Mat, f32), Error>` - the padded image and the resize ratio applied
pub fn letterbox(img: &Mat, target: (i32, i32)) -> Result<(Mat, f32), Error> {
    let img_h = img.rows();
    let img_w = img.cols();
    if img_h <= 0 || img_w <= 0 {
        return Err(Error::msg("cannot letterbox an empty image"))
    }

    let im_ratio = img_w as f32 / img_h as f32;
    let model_ratio = target.0 as f32 / target.1 as f32;

    // the axis that fills the target sets the ratio, the other one is truncated
    let (new_width, new_height, resize_ratio) = if im_ratio > model_ratio {
        let new_width = target.0;
        let new_height = ((new_width as f32 / im_ratio) as i32).max(1);
        (new_width, new_height, new_width as f32 / img_w as f32)
    } else {
        let new_height = target.1;
        let new_width = ((new_height as f32 * im_ratio) as i32).max(1);
        (new_width, new_height, new_height as f32 / img_h as f32)
    };

    let mut img_resized = Mat::default();
    resize(
        img,
        &mut img_resized,
        Size::new(new_width, new_height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut img_scaled = Mat::new_rows_cols_with_default(
        target.1,
        target.0,
        CV_8UC3,
        Scalar::all(0.0),
    )?;

    {
        let mut roi = Mat::roi_mut(&mut img_scaled, Rect::new(0, 0, new_width, new_height))?;
        img_resized.copy_to(&mut roi)?;
    }

    Ok((img_scaled, resize_ratio))
}

/// mat_to_nchw_tensor converts a 3 channel u8 matrix into a normalized `1xCxHxW` tensor.
///
/// # Arguments
/// * `img` - OpenCV matrix (CV_8UC3)
/// * `normalize` - maps (channel, pixel value) to the model input value
///
/// # Returns
/// * `Result<Array4<f32>, Error>`
pub fn mat_to_nchw_tensor<F>(img: &Mat, normalize: F) -> Result<Array4<f32>, Error>
where
    F: Fn(usize, u8) -> f32,
{
    let rows = img.rows();
    let cols = img.cols();
    let mut im_tensor = Array3::<f32>::zeros((rows as usize, cols as usize, 3usize));

    for y in 0..rows {
        for x in 0..cols {
            let pixel = img.at_2d::<Vec3b>(y, x)?;
            for i in 0..3 {
                im_tensor[[y as usize, x as usize, i]] = normalize(i, pixel[i]);
            }
        }
    }

    let transposed_tensors = im_tensor.permuted_axes([2, 0, 1]);
    Ok(transposed_tensors.insert_axis(Axis(0)))
}
