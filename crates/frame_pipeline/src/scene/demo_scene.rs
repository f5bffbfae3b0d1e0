use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use bevy_math::Mat4;
use bevy_math::Vec3;
use bevy_math::Vec4;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::FrameResult;
use crate::geometry::create_sphere;
use crate::geometry::room;
use crate::geometry::Geometry;
use crate::mesh::load_mesh;
use crate::scene::Material;
use crate::scene::RenderItem;
use crate::scene::RenderLayer;
use crate::scene::Scene;
use crate::scene::SceneBuilder;
use crate::scene::Texture;
use crate::scene::TextureId;

const SPHERE_X: [f32; 4] = [-10.0, -5.0, 5.0, 10.0];

/// Files looked up in the texture directory. Any that are missing are generated.
pub const DEMO_TEXTURE_FILES: [&str; 4] = ["WireFence.png", "bricks3.png", "checkboard.png", "ice.png"];

/// Four spheres in a row behind a room with a translucent mirror, plus an
/// optional mesh file placed on the floor.
///
/// Textures are read from `textures` when it holds the matching file and
/// generated otherwise.
pub fn demo_scene(mesh: Option<&Path>, textures: Option<&Path>) -> FrameResult<Scene> {
    let mut builder = SceneBuilder::new();

    let [fence_file, bricks_file, checker_file, ice_file] = DEMO_TEXTURE_FILES;
    let fence_tex = builder.add_texture(texture_or(textures, fence_file, || {
        Texture::wire_fence("wirefence", 128)
    })?);
    let bricks_tex = builder.add_texture(texture_or(textures, bricks_file, || {
        Texture::bricks("bricks", 128)
    })?);
    let checker_tex = builder.add_texture(texture_or(textures, checker_file, || {
        Texture::checker("checkertile", 128, 8, [230, 230, 230, 255], [40, 40, 48, 255])
    })?);
    let ice_tex = builder.add_texture(texture_or(textures, ice_file, || Texture::ice("ice", 128))?);

    let wood_crate = builder.add_material(Material {
        fresnel_r0: Vec3::splat(0.05),
        roughness: 0.2,
        ..Material::new("woodCrate", fence_tex)
    });
    let bricks = builder.add_material(Material {
        fresnel_r0: Vec3::splat(0.05),
        roughness: 0.25,
        ..Material::new("bricks", bricks_tex)
    });
    let checkertile = builder.add_material(Material {
        fresnel_r0: Vec3::splat(0.07),
        roughness: 0.3,
        ..Material::new("checkertile", checker_tex)
    });
    let icemirror = builder.add_material(Material {
        diffuse_albedo: Vec4::new(1.0, 1.0, 1.0, 0.3),
        fresnel_r0: Vec3::splat(0.1),
        roughness: 0.5,
        ..Material::new("icemirror", ice_tex)
    });

    let (vertices, indices) = create_sphere(1.0, 20, 20);
    let sphere_geo = builder.add_geometry(Geometry::single("sphereGeo", "sphere", vertices, indices));
    let room_geo = builder.add_geometry(room());

    for (i, x) in SPHERE_X.into_iter().enumerate() {
        let (layer, material) = match i {
            0 | 3 => (RenderLayer::AlphaTested, wood_crate),
            1 => (RenderLayer::Opaque, bricks),
            _ => (RenderLayer::Opaque, checkertile),
        };
        builder.add_item(
            layer,
            RenderItem::new(format!("sphere{}", i + 1), sphere_geo, "sphere")
                .with_world(Mat4::from_translation(Vec3::new(x, 5.0, 10.0)))
                .with_material(material),
        );
    }

    builder.add_item(
        RenderLayer::Opaque,
        RenderItem::new("floor", room_geo, "floor").with_material(checkertile),
    );
    builder.add_item(
        RenderLayer::Opaque,
        RenderItem::new("wall", room_geo, "wall").with_material(bricks),
    );
    builder.add_item(
        RenderLayer::Transparent,
        RenderItem::new("mirror", room_geo, "mirror").with_material(icemirror),
    );

    if let Some(path) = mesh {
        add_mesh(&mut builder, path)?;
    }

    let scene = builder.build();
    info!(
        objects = scene.object_count(),
        materials = scene.material_count(),
        textures = scene.texture_count(),
        "built demo scene"
    );
    Ok(scene)
}

fn texture_or(
    dir: Option<&Path>,
    file: &str,
    generate: impl FnOnce() -> Texture,
) -> FrameResult<Texture> {
    match dir.map(|dir| dir.join(file)) {
        Some(path) if path.is_file() => Ok(Texture::load(&path)?),
        Some(path) => {
            debug!(path = %path.display(), "texture file not found, generating it");
            Ok(generate())
        }
        None => Ok(generate()),
    }
}

/// One render item per mesh part, each with a material built from the part's
/// diffuse color and `map_Kd`. Parts sharing a texture file share the view.
fn add_mesh(builder: &mut SceneBuilder, path: &Path) -> FrameResult<()> {
    let loaded = load_mesh(path)?;
    let world = fit_on_floor(&loaded.geometry);
    let geometry = builder.add_geometry(loaded.geometry);

    let mut white = None;
    let mut loaded_textures: HashMap<PathBuf, TextureId> = HashMap::new();
    for part in loaded.parts {
        let texture = match part.diffuse_texture {
            Some(file) => match loaded_textures.get(&file).copied() {
                Some(id) => Some(id),
                None => match Texture::load(&file) {
                    Ok(texture) => {
                        let id = builder.add_texture(texture);
                        loaded_textures.insert(file, id);
                        Some(id)
                    }
                    Err(error) => {
                        warn!(part = %part.submesh, %error, "using a plain texture");
                        None
                    }
                },
            },
            None => None,
        };
        let texture = texture.unwrap_or_else(|| {
            *white.get_or_insert_with(|| builder.add_texture(Texture::solid("white", [255; 4])))
        });

        let [r, g, b] = part.diffuse;
        let material = builder.add_material(Material {
            diffuse_albedo: Vec4::new(r, g, b, 1.0),
            fresnel_r0: Vec3::splat(0.04),
            roughness: 0.4,
            ..Material::new(format!("mesh/{}", part.submesh), texture)
        });
        builder.add_item(
            RenderLayer::Opaque,
            RenderItem::new(format!("mesh/{}", part.submesh), geometry, part.submesh)
                .with_world(world)
                .with_material(material),
        );
    }
    Ok(())
}

/// Scale a mesh to two units across and stand it on the floor in front of the mirror.
fn fit_on_floor(geometry: &Geometry) -> Mat4 {
    let (min, max) = geometry.vertices.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), vertex| {
            let pos = Vec3::from_array(vertex.pos);
            (min.min(pos), max.max(pos))
        },
    );
    let extent = (max - min).max_element();
    if !extent.is_finite() || extent <= 0.0 {
        return Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    }
    let scale = 2.0 / extent;
    let center = (min + max) * 0.5;
    let lift = (center.y - min.y) * scale;
    Mat4::from_translation(Vec3::new(0.0, lift, -5.0))
        * Mat4::from_scale(Vec3::splat(scale))
        * Mat4::from_translation(-center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor_layout::DescriptorLayout;
    use crate::frame_ring::FRAME_RESOURCE_COUNT;

    #[test]
    fn demo_counts_match_the_descriptor_layout() {
        let scene = demo_scene(None, None).unwrap();
        assert_eq!(scene.object_count(), 7);
        assert_eq!(scene.material_count(), 4);
        assert_eq!(scene.texture_count(), 4);

        let layout = DescriptorLayout::new(7, 4, FRAME_RESOURCE_COUNT as u32, 4);
        assert_eq!(layout.heap_size(), (7 + 4 + 1) * 3 + 4);
    }

    #[test]
    fn every_demo_item_resolves() {
        let scene = demo_scene(None, None).unwrap();
        for layer in RenderLayer::ALL {
            for &id in scene.layer(layer) {
                assert!(scene.resolve(id).unwrap().is_ok(), "{:?}", scene.item(id));
            }
        }
        assert_eq!(scene.layer(RenderLayer::AlphaTested).len(), 2);
        assert_eq!(scene.layer(RenderLayer::Transparent).len(), 1);
    }

    #[test]
    fn mirror_is_translucent() {
        let scene = demo_scene(None, None).unwrap();
        let mirror = scene.find_material("icemirror").and_then(|id| scene.material(id)).unwrap();
        assert_eq!(mirror.diffuse_albedo.w, 0.3);
        assert_eq!(mirror.mat_cb_index, 3);
    }

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("frame_pipeline_{label}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, color: [u8; 4]) {
        image::RgbaImage::from_pixel(2, 2, image::Rgba(color)).save(path).unwrap();
    }

    #[test]
    fn texture_files_replace_the_generated_ones() {
        let dir = scratch_dir("textures");
        write_png(&dir.join("bricks3.png"), [1, 2, 3, 255]);
        let scene = demo_scene(None, Some(&dir));
        std::fs::remove_dir_all(&dir).unwrap();

        let scene = scene.unwrap();
        assert_eq!(scene.texture_count(), 4);
        let bricks = &scene.textures()[1];
        assert_eq!((bricks.width, bricks.height), (2, 2));
        assert_eq!(&bricks.pixels[..4], &[1, 2, 3, 255]);
        // Not on disk, so generated.
        assert_eq!(scene.textures()[0].name, "wirefence");
        assert_eq!(scene.textures()[0].width, 128);
    }

    #[test]
    fn corrupt_texture_file_is_an_error() {
        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("ice.png"), b"not a png").unwrap();
        let result = demo_scene(None, Some(&dir));
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(result, Err(crate::error::FrameError::Texture(_))));
    }

    #[test]
    fn every_mesh_part_gets_its_own_material_and_texture() {
        let dir = scratch_dir("mesh");
        std::fs::write(
            dir.join("pair.obj"),
            "mtllib pair.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\no plain\nf 3 2 1\no \
             painted\nusemtl red\nf 1 2 3\n",
        )
        .unwrap();
        std::fs::write(dir.join("pair.mtl"), "newmtl red\nKd 0.9 0.1 0.1\nmap_Kd red.png\n").unwrap();
        write_png(&dir.join("red.png"), [200, 0, 0, 255]);
        let scene = demo_scene(Some(&dir.join("pair.obj")), None);
        std::fs::remove_dir_all(&dir).unwrap();

        let scene = scene.unwrap();
        assert_eq!(scene.object_count(), 9);
        assert_eq!(scene.material_count(), 6);
        assert_eq!(scene.texture_count(), 6);

        let painted = scene.find_material("mesh/painted").and_then(|id| scene.material(id)).unwrap();
        assert_eq!(painted.diffuse_albedo, Vec4::new(0.9, 0.1, 0.1, 1.0));
        let texture = &scene.textures()[painted.diffuse_srv_index as usize];
        assert_eq!(&texture.pixels[..4], &[200, 0, 0, 255]);

        let plain = scene.find_material("mesh/plain").and_then(|id| scene.material(id)).unwrap();
        assert_eq!(scene.textures()[plain.diffuse_srv_index as usize].name, "white");
        for layer in RenderLayer::ALL {
            for &id in scene.layer(layer) {
                assert!(scene.resolve(id).unwrap().is_ok(), "{:?}", scene.item(id));
            }
        }
    }

    #[test]
    fn unreadable_part_texture_falls_back_to_white() {
        let dir = scratch_dir("missing_map");
        std::fs::write(dir.join("tri.obj"), "mtllib tri.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3\n")
            .unwrap();
        std::fs::write(dir.join("tri.mtl"), "newmtl red\nKd 1 0 0\nmap_Kd gone.png\n").unwrap();
        let scene = demo_scene(Some(&dir.join("tri.obj")), None);
        std::fs::remove_dir_all(&dir).unwrap();

        let scene = scene.unwrap();
        assert_eq!(scene.texture_count(), 5);
        assert_eq!(scene.textures()[4].name, "white");
    }

    #[test]
    fn fitted_mesh_rests_on_the_floor() {
        let mut geometry = room();
        geometry.vertices.iter_mut().for_each(|v| v.pos[1] += 10.0);
        let world = fit_on_floor(&geometry);
        let lowest = geometry
            .vertices
            .iter()
            .map(|v| world.transform_point3(Vec3::from_array(v.pos)).y)
            .fold(f32::MAX, f32::min);
        approx::assert_relative_eq!(lowest, 0.0, epsilon = 1e-4);
    }
}
