//! GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Only the tags wildpath needs are understood: ModelPixelScale and
//! ModelTiepoint for the lattice, the GeoKey directory for the CRS
//! (EPSG code or a citation string) and GDAL_NODATA for the sentinel.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray64Float};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

/// Tag number of GeoAsciiParams, referenced from inside the key directory
const GEO_ASCII_PARAMS: u16 = 34737;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Read band 1 of a GeoTIFF into a Raster.
///
/// Pixel values that do not fit `T` become `T`'s default no-data.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let raster = decode_geotiff(BufReader::new(file))?;
    tracing::debug!(
        path = %path.display(),
        rows = raster.rows(),
        cols = raster.cols(),
        crs = ?raster.crs().map(|c| c.identifier()),
        "read GeoTIFF"
    );
    Ok(raster)
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ));
        }
    };

    // Multi-sample images decode interleaved; keep the first sample.
    let samples = data.len() / (rows * cols).max(1);
    let data = match samples {
        1 => data,
        n if n > 1 && data.len() == rows * cols * n => data.into_iter().step_by(n).collect(),
        _ => {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .and_then(T::from_f64);
    raster.set_nodata(Some(nodata.unwrap_or_else(T::default_nodata)));

    Ok(raster)
}

fn cast_all<S: Copy + num_traits::NumCast, T: RasterElement>(buf: &[S]) -> Vec<T> {
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    GeoTransform::from_geotiff_tags(&scale, &tiepoint)
}

/// CRS from the GeoKey directory; `None` when the file carries no usable key.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    let mut citation = None;
    for entry in keys[4..].chunks_exact(4) {
        let (key, location, count, value) = (entry[0], entry[1], entry[2], entry[3]);
        match key {
            PROJECTED_CS_TYPE | GEOGRAPHIC_TYPE if location == 0 && value != USER_DEFINED => {
                return Some(CRS::from_epsg(value as u32));
            }
            GT_CITATION if location == GEO_ASCII_PARAMS => {
                citation = Some((value as usize, count as usize));
            }
            _ => {}
        }
    }

    let (offset, count) = citation?;
    let ascii = decoder
        .get_tag_ascii_string(Tag::GeoAsciiParamsTag)
        .ok()?;
    let text: String = ascii.chars().skip(offset).take(count).collect();
    let crs: CRS = text.trim_end_matches(['|', '\0']).parse().ok()?;
    (!crs.is_unknown()).then_some(crs)
}

/// Write a Raster to a GeoTIFF file as 32-bit float.
///
/// No-data cells are written as NaN and GDAL_NODATA is set to `nan`.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_geotiff::<Gray32Float, _, _>(raster, &mut writer)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), rows = raster.rows(), cols = raster.cols(), "wrote GeoTIFF");
    Ok(())
}

/// Write a Raster as 64-bit float so that every `f64` (and every integer
/// cell up to 32 bits) reads back bit for bit.
///
/// Used for intermediates that feed later computation.
pub fn write_geotiff_f64<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_geotiff::<Gray64Float, _, _>(raster, &mut writer)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), rows = raster.rows(), cols = raster.cols(), "wrote 64-bit GeoTIFF");
    Ok(())
}

fn encode_geotiff<C, T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    C: ColorType,
    C::Inner: num_traits::Float,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let nan = <C::Inner as num_traits::Float>::nan();
    let data: Vec<C::Inner> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                nan
            } else {
                num_traits::cast(v).unwrap_or(nan)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    let tag_error = |what: &str, e: tiff::TiffError| Error::Other(format!("Cannot write {what} tag: {e}"));

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| tag_error("scale", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| tag_error("tiepoint", e))?;

    let (geokeys, ascii) = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| tag_error("geokey", e))?;
    if let Some(ascii) = ascii {
        image
            .encoder()
            .write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())
            .map_err(|e| tag_error("geo ascii params", e))?;
    }

    image
        .encoder()
        .write_tag(Tag::GdalNodata, "nan")
        .map_err(|e| tag_error("nodata", e))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// GeoKey directory for `crs`, plus the GeoAsciiParams payload when the
/// CRS is only known by name or WKT.
fn geokey_directory(crs: Option<&CRS>) -> (Vec<u16>, Option<String>) {
    let mut entries: Vec<[u16; 4]> = Vec::new();
    let mut ascii = None;

    match crs.filter(|c| !c.is_unknown()) {
        Some(crs) => {
            let model_type = if crs.is_geographic() { 2 } else { 1 };
            entries.push([GT_MODEL_TYPE, 0, 1, model_type]);
            entries.push([GT_RASTER_TYPE, 0, 1, 1]);
            match crs.epsg().and_then(|code| u16::try_from(code).ok()) {
                Some(code) => {
                    let key = if crs.is_geographic() {
                        GEOGRAPHIC_TYPE
                    } else {
                        PROJECTED_CS_TYPE
                    };
                    entries.push([key, 0, 1, code]);
                }
                None => {
                    let text = format!("{}|", crs.identifier());
                    let len = u16::try_from(text.len()).unwrap_or(u16::MAX);
                    entries.insert(2, [GT_CITATION, GEO_ASCII_PARAMS, len, 0]);
                    ascii = Some(text);
                }
            }
        }
        None => {
            entries.push([GT_MODEL_TYPE, 0, 1, 1]);
            entries.push([GT_RASTER_TYPE, 0, 1, 1]);
        }
    }

    let mut directory = vec![1, 1, 0, entries.len() as u16];
    directory.extend(entries.into_iter().flatten());
    (directory, ascii)
}
