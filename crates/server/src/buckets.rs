//! AWS region to mirror-bucket mapping.

/// Base URL of the mirror bucket serving an AWS region, or `default_url`
/// for regions without one.
///
/// Blobs are replicated into a bucket per high-traffic region; regions
/// without their own bucket are mapped to the physically nearest one, and
/// anything unrecognized (including regions the vendor adds later) falls
/// through to the default, so every classifiable region has a defined
/// answer.
pub fn aws_region_to_host_url<'a>(region: &str, default_url: &'a str) -> &'a str {
    match region {
        // regions with their own bucket
        "us-east-1" => "https://prod-waypost-us-east-1.s3.dualstack.us-east-1.amazonaws.com",
        "us-east-2" => "https://prod-waypost-us-east-2.s3.dualstack.us-east-2.amazonaws.com",
        "us-west-1" => "https://prod-waypost-us-west-1.s3.dualstack.us-west-1.amazonaws.com",
        "us-west-2" => "https://prod-waypost-us-west-2.s3.dualstack.us-west-2.amazonaws.com",
        "eu-central-1" => {
            "https://prod-waypost-eu-central-1.s3.dualstack.eu-central-1.amazonaws.com"
        }
        "eu-west-3" => "https://prod-waypost-eu-west-3.s3.dualstack.eu-west-3.amazonaws.com",
        "ap-southeast-1" => {
            "https://prod-waypost-ap-southeast-1.s3.dualstack.ap-southeast-1.amazonaws.com"
        }
        "ap-northeast-1" => {
            "https://prod-waypost-ap-northeast-1.s3.dualstack.ap-northeast-1.amazonaws.com"
        }
        "ap-south-1" => "https://prod-waypost-ap-south-1.s3.dualstack.ap-south-1.amazonaws.com",

        // neighbors without a bucket, mapped to the nearest one
        "ca-central-1" | "sa-east-1" => {
            "https://prod-waypost-us-east-1.s3.dualstack.us-east-1.amazonaws.com"
        }
        "eu-west-1" | "eu-west-2" | "eu-north-1" | "eu-south-1" | "af-south-1" => {
            "https://prod-waypost-eu-central-1.s3.dualstack.eu-central-1.amazonaws.com"
        }
        "ap-southeast-2" => {
            "https://prod-waypost-ap-southeast-1.s3.dualstack.ap-southeast-1.amazonaws.com"
        }
        "ap-northeast-2" | "ap-northeast-3" => {
            "https://prod-waypost-ap-northeast-1.s3.dualstack.ap-northeast-1.amazonaws.com"
        }
        "me-south-1" => "https://prod-waypost-ap-south-1.s3.dualstack.ap-south-1.amazonaws.com",

        _ => default_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = "https://cdn.test.waypost.dev";

    #[test]
    fn bucket_regions_map_to_their_bucket() {
        assert_eq!(
            aws_region_to_host_url("eu-west-3", DEFAULT),
            "https://prod-waypost-eu-west-3.s3.dualstack.eu-west-3.amazonaws.com"
        );
        assert_eq!(
            aws_region_to_host_url("us-east-2", DEFAULT),
            "https://prod-waypost-us-east-2.s3.dualstack.us-east-2.amazonaws.com"
        );
    }

    #[test]
    fn neighbors_map_to_nearest_bucket() {
        assert_eq!(
            aws_region_to_host_url("eu-west-1", DEFAULT),
            aws_region_to_host_url("eu-central-1", DEFAULT)
        );
        assert_eq!(
            aws_region_to_host_url("ap-northeast-3", DEFAULT),
            aws_region_to_host_url("ap-northeast-1", DEFAULT)
        );
    }

    #[test]
    fn unknown_regions_fall_through_to_default() {
        assert_eq!(aws_region_to_host_url("mx-central-1", DEFAULT), DEFAULT);
        assert_eq!(aws_region_to_host_url("", DEFAULT), DEFAULT);
    }

    // every region in the compiled tables must resolve to something
    #[test]
    fn every_classifiable_aws_region_has_an_answer() {
        for info in waypost_cloudmap::all_ip_infos() {
            if info.cloud == waypost_cloudmap::Cloud::Aws {
                let url = aws_region_to_host_url(info.region, DEFAULT);
                assert!(url.starts_with("https://"), "{}: {url}", info.region);
            }
        }
    }
}
