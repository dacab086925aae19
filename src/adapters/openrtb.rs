// src/adapters/openrtb.rs
//
// 通用请求构造与出价译码：所有合作方共用的规范请求 → OpenRTB 线级请求、
// 线级响应 → 规范化出价两步，均为无副作用的纯函数。

use crate::adapters::error::{AdapterError, Result};
use crate::model::auction::{AuctionRequest, MediaType};
use crate::model::bid::CanonicalBid;
use crate::model::partner::{PartnerRequest, PartnerUnit};
use crate::openrtb::request::{Banner, BidRequest, Imp, Video};
use crate::openrtb::response::BidResponse;

/// 规范请求 + 合作方广告位列表 → 通用 OpenRTB BidRequest。
///
/// 每个广告位与合作方支持集求媒体类型交集：无交集的广告位直接跳过，
/// 不影响同级广告位；全部被跳过才算配置错误。
/// `single_media_type_imp` 为真时，匹配多个媒体类型的广告位按媒体类型
/// 拆成多个 imp（id 相同）。同一输入必定产出字节一致的序列化结果。
pub fn make_openrtb_generic(
    req: &AuctionRequest,
    partner: &PartnerRequest,
    allowed_media: &[MediaType],
    single_media_type_imp: bool,
) -> Result<BidRequest> {
    let mut imps: Vec<Imp> = Vec::with_capacity(partner.ad_units.len());
    for unit in &partner.ad_units {
        let media = supported_media(unit, allowed_media);
        if media.is_empty() {
            continue;
        }
        if single_media_type_imp {
            for media_type in &media {
                let mut imp = empty_imp(unit);
                populate_media(&mut imp, unit, *media_type);
                imps.push(imp);
            }
        } else {
            let mut imp = empty_imp(unit);
            for media_type in &media {
                populate_media(&mut imp, unit, *media_type);
            }
            imps.push(imp);
        }
    }

    if imps.is_empty() {
        return Err(AdapterError::BadParams(
            "no ad units with supported media types".to_string(),
        ));
    }

    Ok(BidRequest {
        id: req.tid.clone(),
        imp: imps,
        site: req.site.clone(),
        app: req.app.clone(),
        device: req.device.clone(),
        user: req.user.clone(),
        at: Some(1),
        tmax: Some(req.timeout_ms),
        test: None,
    })
}

/// 广告位声明的媒体类型与合作方支持集的交集。
/// banner 需要至少一个尺寸，video 需要广告位带视频配置。
fn supported_media(unit: &PartnerUnit, allowed: &[MediaType]) -> Vec<MediaType> {
    let mut media = Vec::with_capacity(unit.media_types.len());
    for media_type in &unit.media_types {
        if !allowed.contains(media_type) || media.contains(media_type) {
            continue;
        }
        let usable = match media_type {
            MediaType::Banner => !unit.sizes.is_empty(),
            MediaType::Video => unit.video.is_some(),
        };
        if usable {
            media.push(*media_type);
        }
    }
    media
}

fn empty_imp(unit: &PartnerUnit) -> Imp {
    Imp {
        id: unit.code.clone(),
        banner: None,
        video: None,
        tagid: None,
        bidfloor: None,
        ext: None,
    }
}

fn populate_media(imp: &mut Imp, unit: &PartnerUnit, media_type: MediaType) {
    let first = unit.sizes.first();
    match media_type {
        MediaType::Banner => {
            imp.banner = Some(Banner {
                w: first.map(|f| f.w),
                h: first.map(|f| f.h),
                format: unit.sizes.clone(),
                topframe: Some(unit.topframe),
                pos: None,
            });
        }
        MediaType::Video => {
            // supported_media 已保证 video 配置存在
            if let Some(video) = &unit.video {
                imp.video = Some(Video {
                    mimes: video.mimes.clone(),
                    minduration: video.minduration,
                    maxduration: video.maxduration,
                    startdelay: video.startdelay,
                    w: first.map(|f| f.w),
                    h: first.map(|f| f.h),
                });
            }
        }
    }
}

/// 重扫线级请求的 imp 列表推断媒体类型：video 有值即视频，默认 banner。
pub fn media_type_for_imp(imp_id: &str, imps: &[Imp]) -> MediaType {
    for imp in imps {
        if imp.id == imp_id {
            if imp.video.is_some() {
                return MediaType::Video;
            }
            return MediaType::Banner;
        }
    }
    MediaType::Banner
}

/// 线级响应 → 规范化出价。
///
/// 每条 bid 的 impid 必须经查找表反查出规范 bid id：查不到说明
/// 规范 id 与线级 id 的对账已经坏掉，按账目错误整体失败而不是静默丢弃。
/// 合作方给出的价格、尺寸、创意等字段原样保留；同一 imp 的多条 bid
/// 全部保留，响应内顺序不变。
pub fn translate_bids(
    resp: &BidResponse,
    wire_req: &BidRequest,
    partner: &PartnerRequest,
) -> Result<Vec<CanonicalBid>> {
    let mut bids = Vec::new();
    for seatbid in &resp.seatbid {
        for bid in &seatbid.bid {
            let bid_id = partner
                .lookup_bid_id(&bid.impid)
                .ok_or_else(|| AdapterError::UnknownAdUnit(bid.impid.clone()))?;
            bids.push(CanonicalBid {
                bid_id: bid_id.to_string(),
                ad_unit_code: bid.impid.clone(),
                partner_code: partner.partner_code.clone(),
                creative_media_type: media_type_for_imp(&bid.impid, &wire_req.imp),
                price: bid.price,
                adm: bid.adm.clone(),
                creative_id: bid.crid.clone(),
                width: bid.w,
                height: bid.h,
                deal_id: bid.dealid.clone(),
                nurl: bid.nurl.clone(),
            });
        }
    }
    Ok(bids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::auction::VideoParams;
    use crate::openrtb::request::Format;
    use crate::openrtb::response::{Bid, SeatBid};
    use proptest::prelude::*;
    use simd_json::OwnedValue;
    use tokio::time::Instant;

    fn request() -> AuctionRequest {
        AuctionRequest {
            tid: "auction-1".to_string(),
            is_debug: false,
            timeout_ms: 250,
            ad_units: Vec::new(),
            site: None,
            app: None,
            device: None,
            user: None,
            deadline: Instant::now(),
        }
    }

    fn banner_unit(code: &str) -> PartnerUnit {
        PartnerUnit {
            code: code.to_string(),
            bid_id: format!("bid-{}", code),
            sizes: vec![Format { w: 300, h: 250 }, Format { w: 728, h: 90 }],
            media_types: vec![MediaType::Banner],
            topframe: 0,
            video: None,
            params: Box::new(OwnedValue::default()),
        }
    }

    fn video_unit(code: &str) -> PartnerUnit {
        PartnerUnit {
            media_types: vec![MediaType::Video],
            video: Some(VideoParams {
                mimes: vec!["video/mp4".to_string()],
                minduration: Some(5),
                maxduration: Some(30),
                startdelay: None,
            }),
            ..banner_unit(code)
        }
    }

    #[test]
    fn one_imp_per_unit_in_unit_order() {
        let partner = PartnerRequest::new(
            "xhb",
            vec![banner_unit("div-1"), banner_unit("div-2"), banner_unit("div-3")],
        );
        let wire = make_openrtb_generic(&request(), &partner, &[MediaType::Banner], true).unwrap();
        let ids: Vec<&str> = wire.imp.iter().map(|imp| imp.id.as_str()).collect();
        assert_eq!(ids, vec!["div-1", "div-2", "div-3"]);
        let banner = wire.imp[0].banner.as_ref().unwrap();
        assert_eq!(banner.w, Some(300));
        assert_eq!(banner.h, Some(250));
        assert_eq!(banner.format.len(), 2);
    }

    #[test]
    fn unit_without_media_intersection_is_skipped_not_fatal() {
        let partner = PartnerRequest::new("xhb", vec![video_unit("div-1"), banner_unit("div-2")]);
        let wire = make_openrtb_generic(&request(), &partner, &[MediaType::Banner], true).unwrap();
        assert_eq!(wire.imp.len(), 1);
        assert_eq!(wire.imp[0].id, "div-2");
    }

    #[test]
    fn no_usable_unit_is_a_config_error() {
        let partner = PartnerRequest::new("xhb", vec![video_unit("div-1")]);
        let err = make_openrtb_generic(&request(), &partner, &[MediaType::Banner], true)
            .err()
            .unwrap();
        assert!(matches!(err, AdapterError::BadParams(_)));
    }

    #[test]
    fn single_media_type_imp_splits_mixed_unit() {
        let mut unit = video_unit("div-1");
        unit.media_types = vec![MediaType::Banner, MediaType::Video];
        let partner = PartnerRequest::new("xhb", vec![unit]);
        let wire = make_openrtb_generic(
            &request(),
            &partner,
            &[MediaType::Banner, MediaType::Video],
            true,
        )
        .unwrap();
        assert_eq!(wire.imp.len(), 2);
        assert_eq!(wire.imp[0].id, "div-1");
        assert_eq!(wire.imp[1].id, "div-1");
        assert!(wire.imp[0].banner.is_some() && wire.imp[0].video.is_none());
        assert!(wire.imp[1].video.is_some() && wire.imp[1].banner.is_none());
    }

    #[test]
    fn media_type_defaults_to_banner() {
        let partner = PartnerRequest::new("xhb", vec![banner_unit("div-1"), video_unit("div-2")]);
        let wire = make_openrtb_generic(
            &request(),
            &partner,
            &[MediaType::Banner, MediaType::Video],
            true,
        )
        .unwrap();
        assert_eq!(media_type_for_imp("div-1", &wire.imp), MediaType::Banner);
        assert_eq!(media_type_for_imp("div-2", &wire.imp), MediaType::Video);
        assert_eq!(media_type_for_imp("missing", &wire.imp), MediaType::Banner);
    }

    fn response_bid(impid: &str, price: f64) -> Bid {
        Bid {
            id: format!("rb-{}-{}", impid, price),
            impid: impid.to_string(),
            price,
            adm: Some("<html></html>".to_string()),
            nurl: Some("http://partner.example/win".to_string()),
            crid: Some("cr-9".to_string()),
            cid: None,
            dealid: Some("deal-7".to_string()),
            adomain: None,
            w: Some(300),
            h: Some(250),
        }
    }

    #[test]
    fn translation_preserves_response_order_and_duplicates() {
        let partner = PartnerRequest::new("xhb", vec![banner_unit("div-1"), banner_unit("div-2")]);
        let wire = make_openrtb_generic(&request(), &partner, &[MediaType::Banner], true).unwrap();
        let resp = BidResponse {
            id: "auction-1".to_string(),
            seatbid: vec![SeatBid {
                bid: vec![
                    response_bid("div-2", 1.25),
                    response_bid("div-1", 0.40),
                    response_bid("div-2", 0.90),
                ],
                seat: None,
                group: None,
            }],
            bidid: None,
            cur: None,
            nbr: None,
        };
        let bids = translate_bids(&resp, &wire, &partner).unwrap();
        assert_eq!(bids.len(), 3);
        assert_eq!(bids[0].ad_unit_code, "div-2");
        assert_eq!(bids[1].ad_unit_code, "div-1");
        assert_eq!(bids[2].ad_unit_code, "div-2");
        assert_eq!(bids[0].bid_id, "bid-div-2");
        assert_eq!(bids[1].bid_id, "bid-div-1");
        assert_eq!(bids[0].price, 1.25);
        assert_eq!(bids[0].deal_id.as_deref(), Some("deal-7"));
        assert_eq!(bids[0].width, Some(300));
    }

    #[test]
    fn unknown_impid_is_a_bookkeeping_error() {
        let partner = PartnerRequest::new("xhb", vec![banner_unit("div-1")]);
        let wire = make_openrtb_generic(&request(), &partner, &[MediaType::Banner], true).unwrap();
        let resp = BidResponse {
            id: "auction-1".to_string(),
            seatbid: vec![SeatBid {
                bid: vec![response_bid("div-404", 1.0)],
                seat: None,
                group: None,
            }],
            bidid: None,
            cur: None,
            nbr: None,
        };
        let err = translate_bids(&resp, &wire, &partner).err().unwrap();
        assert!(err.is_bookkeeping());
        assert!(matches!(err, AdapterError::UnknownAdUnit(code) if code == "div-404"));
    }

    proptest! {
        // 同一输入构造两次，序列化结果必须逐字节一致
        #[test]
        fn building_twice_is_byte_identical(codes in prop::collection::vec("[a-z]{3,8}", 1..5)) {
            let units: Vec<PartnerUnit> = codes.iter().map(|c| banner_unit(c)).collect();
            let partner = PartnerRequest::new("xhb", units);
            let req = request();
            let first = make_openrtb_generic(&req, &partner, &[MediaType::Banner], true).unwrap();
            let second = make_openrtb_generic(&req, &partner, &[MediaType::Banner], true).unwrap();
            prop_assert_eq!(
                serde_json::to_vec(&first).unwrap(),
                serde_json::to_vec(&second).unwrap()
            );
        }
    }
}
